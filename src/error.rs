use thiserror::Error;

/// Error kinds raised by the LOD subsystem.
///
/// Functions return `anyhow::Result`; these values travel inside it and can be
/// recovered with `downcast_ref::<LodError>()`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LodError {
    /// The operation is declared but not supported (reading `MSFT_lod` back).
    #[error("{0}: not implemented")]
    Unimplemented(&'static str),

    #[error("invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("invalid accessor: {0}")]
    InvalidAccessor(String),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    /// Skinning attributes are refused: variants would not carry the skin.
    #[error("unsupported vertex attribute: {0}")]
    UnsupportedAttribute(String),

    #[error("invalid LOD association: {0}")]
    InvalidAssociation(String),
}
