pub mod chat;
pub mod landing;

use templates::BackendBadge;

/// Backend reachability as checked by the handler right before rendering.
pub struct BackendView<'a> {
    pub available: bool,
    pub detail: Option<&'a str>,
}

impl BackendView<'_> {
    fn badge(&self) -> BackendBadge {
        BackendBadge {
            available: self.available,
            detail: self.detail.map(str::to_string),
        }
    }
}
