//! Input validation for compose, folder, contact, filter and account forms.
//!
//! Every check runs before a request is issued; a form that fails produces the
//! full list of problems rather than the first one.

use crate::model::{Contact, Filter, FilterAction, OutgoingEmail};

/// Folder names the server reserves for system folders.
pub const RESERVED_FOLDER_NAMES: [&str; 5] = ["inbox", "starred", "sent", "drafts", "trash"];

/// Longest accepted folder name, in characters.
pub const MAX_FOLDER_NAME_LENGTH: usize = 50;

/// Shortest accepted username at registration.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Shortest accepted password at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Validation error for user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// No recipient given.
    EmptyRecipients,
    /// A recipient address is malformed.
    InvalidRecipient,
    /// Both subject and body are blank.
    EmptySubjectAndBody,
    /// Priority outside 1..=4.
    InvalidPriority,
    /// Folder name is empty.
    EmptyFolderName,
    /// Folder name is too long.
    FolderNameTooLong,
    /// Folder name has characters other than letters, digits, space, `-`, `_`.
    InvalidFolderName,
    /// Folder name collides with a system folder.
    ReservedFolderName,
    /// Contact name is empty.
    EmptyContactName,
    /// Contact email is empty.
    EmptyContactEmail,
    /// Contact email format is invalid.
    InvalidContactEmail,
    /// Filter value is empty.
    EmptyFilterValue,
    /// Move filter without a target folder.
    EmptyFilterFolder,
    /// Forward filter without a valid target address.
    InvalidForwardAddress,
    /// Username is empty.
    EmptyUsername,
    /// Username is too short.
    UsernameTooShort,
    /// Username has characters other than letters, digits, `_`.
    InvalidUsername,
    /// Password is empty.
    EmptyPassword,
    /// Password is too short.
    PasswordTooShort,
    /// Password lacks an uppercase letter, a lowercase letter or a digit.
    WeakPassword,
    /// A bulk action was requested with nothing selected.
    EmptySelection,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyRecipients => "At least one recipient is required",
            Self::InvalidRecipient => "Invalid recipient address",
            Self::EmptySubjectAndBody => "Subject or body is required",
            Self::InvalidPriority => "Priority must be 1-4",
            Self::EmptyFolderName => "Folder name is required",
            Self::FolderNameTooLong => "Folder name must be less than 50 characters",
            Self::InvalidFolderName => {
                "Folder name can only contain letters, numbers, spaces, hyphens, and underscores"
            }
            Self::ReservedFolderName => "Cannot use reserved folder name",
            Self::EmptyContactName => "Contact name is required",
            Self::EmptyContactEmail => "Contact email is required",
            Self::InvalidContactEmail => "Invalid email address format",
            Self::EmptyFilterValue => "Filter value is required",
            Self::EmptyFilterFolder => "Target folder is required",
            Self::InvalidForwardAddress => "Invalid forwarding address",
            Self::EmptyUsername => "Username is required",
            Self::UsernameTooShort => "Username must be at least 3 characters long",
            Self::InvalidUsername => "Username can only contain letters, numbers, and underscores",
            Self::EmptyPassword => "Password is required",
            Self::PasswordTooShort => "Password must be at least 8 characters long",
            Self::WeakPassword => {
                "Password must contain at least one uppercase letter, one lowercase letter, and one number"
            }
            Self::EmptySelection => "No messages selected",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyRecipients | Self::InvalidRecipient => "to",
            Self::EmptySubjectAndBody => "subject",
            Self::InvalidPriority => "priority",
            Self::EmptyFolderName
            | Self::FolderNameTooLong
            | Self::InvalidFolderName
            | Self::ReservedFolderName => "folder",
            Self::EmptyContactName => "name",
            Self::EmptyContactEmail | Self::InvalidContactEmail => "email",
            Self::EmptyFilterValue => "value",
            Self::EmptyFilterFolder => "newFolder",
            Self::InvalidForwardAddress => "forwardedTo",
            Self::EmptyUsername | Self::UsernameTooShort | Self::InvalidUsername => "username",
            Self::EmptyPassword | Self::PasswordTooShort | Self::WeakPassword => "password",
            Self::EmptySelection => "selection",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a form.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

fn finish(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate a message before send.
///
/// # Errors
///
/// Returns every problem found.
pub fn validate_outgoing(email: &OutgoingEmail) -> ValidationResult {
    let mut errors = Vec::new();

    let recipients: Vec<&str> = email
        .to
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .collect();
    if recipients.is_empty() {
        errors.push(ValidationError::EmptyRecipients);
    } else if !recipients.iter().all(|r| is_valid_email(r)) {
        errors.push(ValidationError::InvalidRecipient);
    }

    if email.subject.trim().is_empty() && email.body.trim().is_empty() {
        errors.push(ValidationError::EmptySubjectAndBody);
    }
    if !(1..=4).contains(&email.priority) {
        errors.push(ValidationError::InvalidPriority);
    }

    finish(errors)
}

/// Validate a draft. Drafts may be incomplete; only present recipients are
/// checked for format.
///
/// # Errors
///
/// Returns every problem found.
pub fn validate_draft(email: &OutgoingEmail) -> ValidationResult {
    let mut errors = Vec::new();
    if email
        .to
        .iter()
        .map(|r| r.trim())
        .any(|r| !r.is_empty() && !is_valid_email(r))
    {
        errors.push(ValidationError::InvalidRecipient);
    }
    if !(1..=4).contains(&email.priority) {
        errors.push(ValidationError::InvalidPriority);
    }
    finish(errors)
}

/// Validate a custom folder name.
///
/// # Errors
///
/// Returns the first rule the name breaks.
pub fn validate_folder_name(name: &str) -> ValidationResult {
    let name = name.trim();
    let error = if name.is_empty() {
        ValidationError::EmptyFolderName
    } else if name.chars().count() >= MAX_FOLDER_NAME_LENGTH {
        ValidationError::FolderNameTooLong
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
    {
        ValidationError::InvalidFolderName
    } else if RESERVED_FOLDER_NAMES
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
    {
        ValidationError::ReservedFolderName
    } else {
        return Ok(());
    };
    Err(vec![error])
}

/// Validate a contact.
///
/// # Errors
///
/// Returns every problem found.
pub fn validate_contact(contact: &Contact) -> ValidationResult {
    let mut errors = Vec::new();
    if contact.name.trim().is_empty() {
        errors.push(ValidationError::EmptyContactName);
    }
    if contact.email.trim().is_empty() {
        errors.push(ValidationError::EmptyContactEmail);
    } else if !is_valid_email(&contact.email) {
        errors.push(ValidationError::InvalidContactEmail);
    }
    finish(errors)
}

/// Validate a filter rule.
///
/// # Errors
///
/// Returns every problem found.
pub fn validate_filter(filter: &Filter) -> ValidationResult {
    let mut errors = Vec::new();
    if filter.conditions.iter().any(|c| c.value.trim().is_empty()) || filter.conditions.is_empty()
    {
        errors.push(ValidationError::EmptyFilterValue);
    }
    match &filter.action {
        FilterAction::Move { folder } if folder.trim().is_empty() => {
            errors.push(ValidationError::EmptyFilterFolder);
        }
        FilterAction::Forward { to } if !is_valid_email(to) => {
            errors.push(ValidationError::InvalidForwardAddress);
        }
        _ => {}
    }
    finish(errors)
}

/// Validate login input.
///
/// # Errors
///
/// Returns every problem found.
pub fn validate_login(username: &str, password: &str) -> ValidationResult {
    let mut errors = Vec::new();
    if username.trim().is_empty() {
        errors.push(ValidationError::EmptyUsername);
    }
    if password.is_empty() {
        errors.push(ValidationError::EmptyPassword);
    }
    finish(errors)
}

/// Validate registration input.
///
/// # Errors
///
/// Returns the first username problem and the first password problem.
pub fn validate_registration(username: &str, password: &str) -> ValidationResult {
    let mut errors = Vec::new();

    let username = username.trim();
    if username.is_empty() {
        errors.push(ValidationError::EmptyUsername);
    } else if username.chars().count() < MIN_USERNAME_LENGTH {
        errors.push(ValidationError::UsernameTooShort);
    } else if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        errors.push(ValidationError::InvalidUsername);
    }

    if password.is_empty() {
        errors.push(ValidationError::EmptyPassword);
    } else if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(ValidationError::PasswordTooShort);
    } else if !(password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit()))
    {
        errors.push(ValidationError::WeakPassword);
    }

    finish(errors)
}

/// Basic email validation.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.contains(char::is_whitespace) {
        return false;
    }

    // At least one dot, no empty labels
    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}
