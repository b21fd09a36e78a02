use thiserror::Error;

/// Unified result type for the scrim crate.
pub type Result<T> = std::result::Result<T, ScrimError>;

/// Errors surfaced by the overlay engine.
///
/// The lifecycle algorithms themselves recover locally (missing window,
/// duplicate close, guard rejection and payload-key mismatches are all
/// silent no-ops); these variants cover the genuinely fallible edges.
#[derive(Debug, Error)]
pub enum ScrimError {
    #[error("fragment `{0}` failed to mount: {1}")]
    FragmentMount(String, String),
    #[error("fragment `{0}` failed to render: {1}")]
    FragmentRender(String, String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
