//! Input validation limits for security and resource protection

/// Maximum length for instance and type IDs (1024 bytes)
pub const MAX_ID_LEN: usize = 1024;

/// Maximum traversal depth (50)
pub const MAX_TRAVERSAL_DEPTH: u32 = 50;

/// Maximum results in a single page (1000)
pub const MAX_PAGE_SIZE: usize = 1000;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyId,
    IdTooLong { len: usize, max: usize },
    TraversalDepthTooLarge { depth: u32, max: u32 },
    PageTooLarge { size: usize, max: usize },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "ID cannot be empty"),
            Self::IdTooLong { len, max } => {
                write!(f, "ID too long: {} bytes (max {})", len, max)
            }
            Self::TraversalDepthTooLarge { depth, max } => {
                write!(f, "Traversal depth too large: {} (max {})", depth, max)
            }
            Self::PageTooLarge { size, max } => {
                write!(f, "Page too large: {} results (max {})", size, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate an instance or type ID
pub fn validate_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyId);
    }
    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::IdTooLong {
            len: id.len(),
            max: MAX_ID_LEN,
        });
    }
    Ok(())
}

/// Validate traversal depth
pub fn validate_traversal_depth(depth: u32) -> Result<(), ValidationError> {
    if depth > MAX_TRAVERSAL_DEPTH {
        return Err(ValidationError::TraversalDepthTooLarge {
            depth,
            max: MAX_TRAVERSAL_DEPTH,
        });
    }
    Ok(())
}

/// Validate requested page size
pub fn validate_page_size(size: usize) -> Result<(), ValidationError> {
    if size > MAX_PAGE_SIZE {
        return Err(ValidationError::PageTooLarge {
            size,
            max: MAX_PAGE_SIZE,
        });
    }
    Ok(())
}
