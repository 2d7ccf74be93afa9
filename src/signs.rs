use tracing::debug;

use crate::github::ReviewComment;
use crate::host::{EditorHost, SessionBuffers};
use crate::index;

/// Projects cached comments onto gutter signs of a diff session.
///
/// Rendering always starts from a clean slate, so calling it redundantly or
/// with stale arguments is harmless.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignProjector;

impl SignProjector {
    /// Clear both buffers, then place one sign per distinct (side, line)
    /// anchored on `path`. Returns the number of signs placed.
    pub fn render_signs_for_file<H: EditorHost + ?Sized>(
        &self,
        host: &mut H,
        buffers: SessionBuffers,
        path: &str,
        comments: &[ReviewComment],
    ) -> usize {
        host.clear_signs(buffers.left);
        host.clear_signs(buffers.right);

        let mut placed = 0;
        for (side, line) in index::anchors_for_file(comments, path) {
            let buffer = buffers.for_side(side);
            let line_count = host.line_count(buffer);
            if line == 0 || line as usize > line_count {
                // バッファが変わった可能性がある
                debug!(
                    "Skipping sign for {}:{} ({}) beyond {} lines",
                    path, line, side, line_count
                );
                continue;
            }
            host.place_sign(buffer, line);
            placed += 1;
        }
        placed
    }

    /// Clear signs without placing new ones
    pub fn clear<H: EditorHost + ?Sized>(&self, host: &mut H, buffers: SessionBuffers) {
        host.clear_signs(buffers.left);
        host.clear_signs(buffers.right);
    }
}
