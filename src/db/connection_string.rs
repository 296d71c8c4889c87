// Driver Connection String
// Assembles ODBC-style connection strings from credentials and parses them back

use crate::db::credentials::Credentials;
use crate::db::traits::DriverError;

/// Clauses in the order the driver expects them. PWD is kept separate so the
/// logged form and the connecting form can never be confused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    clauses: Vec<(&'static str, String)>,
    password: String,
}

impl ConnectionString {
    pub fn from_credentials(credentials: &Credentials) -> Self {
        let clauses = vec![
            ("DRIVER", format!("{{{}}}", credentials.driver_or_default())),
            ("SERVER", quote_value(&credentials.host)),
            ("DATABASE", quote_value(&credentials.database)),
            ("PORT", credentials.port_or_default().to_string()),
            ("AUTHENTICATION", credentials.authentication.to_string()),
            ("AUTOCOMMIT", "TRUE".to_string()),
            (
                "UID",
                quote_value(credentials.username.as_deref().unwrap_or_default()),
            ),
        ];

        Self {
            clauses,
            password: credentials.password.clone().unwrap_or_default(),
        }
    }

    fn base(&self) -> String {
        self.clauses
            .iter()
            .map(|(key, value)| format!("{}={};", key, value))
            .collect()
    }

    /// The string handed to the driver, with the real password last
    pub fn expose(&self) -> String {
        format!("{}PWD={};", self.base(), quote_value(&self.password))
    }

    /// The string that may be written to logs
    pub fn redacted(&self) -> String {
        format!("{}PWD={};", self.base(), obfuscate_password(&self.password))
    }
}

/// Mask a password for logging: first character, one asterisk per hidden
/// character, last character. Passwords of one or two characters are masked
/// entirely so no character leaks.
pub fn obfuscate_password(password: &str) -> String {
    let chars: Vec<char> = password.chars().collect();
    match chars.len() {
        0 => String::new(),
        len @ 1..=2 => "*".repeat(len),
        len => {
            let mut masked = String::with_capacity(password.len());
            masked.push(chars[0]);
            masked.push_str(&"*".repeat(len - 2));
            masked.push(chars[len - 1]);
            masked
        }
    }
}

fn needs_quoting(value: &str) -> bool {
    value.contains(&[';', '{', '}'][..]) || value.trim() != value
}

/// Brace a value when it would otherwise break the key=value; grammar
fn quote_value(value: &str) -> String {
    if needs_quoting(value) {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

/// Split a connection string into (KEY, value) pairs. Keys are upper-cased,
/// braced values are unwrapped and `}}` is unescaped.
pub fn parse(connection_string: &str) -> Result<Vec<(String, String)>, DriverError> {
    let mut pairs = Vec::new();
    let mut chars = connection_string.chars().peekable();

    loop {
        // Skip separators and whitespace between clauses
        while matches!(chars.peek(), Some(c) if *c == ';' || c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        loop {
            match chars.next() {
                Some('=') => break,
                Some(';') | None => {
                    return Err(DriverError::Runtime(format!(
                        "malformed connection string clause '{}'",
                        key.trim()
                    )))
                }
                Some(c) => key.push(c),
            }
        }

        let mut value = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            loop {
                match chars.next() {
                    Some('}') if chars.peek() == Some(&'}') => {
                        chars.next();
                        value.push('}');
                    }
                    Some('}') => break,
                    Some(c) => value.push(c),
                    None => {
                        return Err(DriverError::Runtime(format!(
                            "unterminated brace in value of '{}'",
                            key.trim()
                        )))
                    }
                }
            }
            // Anything between the closing brace and the separator is ignored
            while matches!(chars.peek(), Some(c) if *c != ';') {
                chars.next();
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == ';' {
                    break;
                }
                value.push(*c);
                chars.next();
            }
            value = value.trim().to_string();
        }

        pairs.push((key.trim().to_ascii_uppercase(), value));
    }

    Ok(pairs)
}
