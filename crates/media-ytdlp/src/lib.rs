mod error;
mod format;
mod section;
mod title;

pub use error::{Result, YtDlpError};
pub use format::RenderFormat;
pub use section::{RenderedClip, SectionRequest, YtDlp};
pub use title::{FALLBACK_TITLE, sanitize_title};
