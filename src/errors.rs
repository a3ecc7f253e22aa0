use std::fmt;

/// Centralized error type for the bot
#[derive(Debug)]
pub enum BotError {
    /// yt-dlp failed to extract or download the media
    DownloadFailed(String),
    /// Filesystem errors
    FileSystemError(std::io::Error),
    /// Telegram API errors
    TelegramError(teloxide::RequestError),
    /// SQLite / sqlx errors
    DatabaseError(sqlx::Error),
    /// Data parsing errors
    ParseError(String),
    /// File not found
    FileNotFound(String),
    /// File exceeds the upload ceiling
    FileTooLarge(String),
    /// Invalid configuration values
    InvalidConfig(String),
    /// Callback token that doesn't map to any known action
    UnknownCallback(String),
    /// External command exited with an error
    ExternalCommandError { command: String, stderr: String },
    /// General error with a description
    General(String),
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotError::DownloadFailed(msg) => write!(f, "Download failed: {}", msg),
            BotError::FileSystemError(e) => write!(f, "Filesystem error: {}", e),
            BotError::TelegramError(e) => write!(f, "Telegram API error: {}", e),
            BotError::DatabaseError(e) => write!(f, "Database error: {}", e),
            BotError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            BotError::FileNotFound(path) => write!(f, "File not found: {}", path),
            BotError::FileTooLarge(msg) => write!(f, "File is too large: {}", msg),
            BotError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            BotError::UnknownCallback(data) => write!(f, "Unknown callback: {}", data),
            BotError::ExternalCommandError { command, stderr } => {
                write!(f, "Command {} failed: {}", command, stderr)
            }
            BotError::General(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BotError::FileSystemError(e) => Some(e),
            BotError::TelegramError(e) => Some(e),
            BotError::DatabaseError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::FileSystemError(err)
    }
}

impl From<teloxide::RequestError> for BotError {
    fn from(err: teloxide::RequestError) -> Self {
        BotError::TelegramError(err)
    }
}

impl From<sqlx::Error> for BotError {
    fn from(err: sqlx::Error) -> Self {
        BotError::DatabaseError(err)
    }
}

impl From<sqlx::migrate::MigrateError> for BotError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        BotError::General(format!("Failed to run migrations: {}", err))
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::ParseError(format!("JSON parsing error: {}", err))
    }
}

impl BotError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    pub fn file_too_large(msg: impl Into<String>) -> Self {
        Self::FileTooLarge(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn unknown_callback(data: impl Into<String>) -> Self {
        Self::UnknownCallback(data.into())
    }

    pub fn external_command_error(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::ExternalCommandError {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::General(msg.into())
    }

    /// Text shown to the user when a download attempt fails
    pub fn user_message(&self) -> String {
        match self {
            BotError::FileTooLarge(_) => "File is too large to send via Telegram".to_string(),
            BotError::FileNotFound(_) => "File was not downloaded".to_string(),
            BotError::DownloadFailed(msg) => {
                let first_line = msg.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
                format!("Could not download the video: {}", first_line.trim())
            }
            other => other.to_string(),
        }
    }
}

/// Result of bot operations
pub type BotResult<T> = Result<T, BotError>;

/// Result for handlers
pub type HandlerResult = BotResult<()>;
