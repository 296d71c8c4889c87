// Database Drivers
// Implementations of the driver seam

pub mod mssql;

pub use mssql::MssqlDriver;
