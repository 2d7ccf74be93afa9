//! Common utilities for benchmarks.
//!
//! Provides test data generators with fixed seeds for reproducibility.

#![allow(dead_code)]

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;

use prsign::{ReviewComment, Side, User};

/// Fixed seed for reproducible benchmark data
const SEED: u64 = 42;

/// Create a seeded RNG for reproducible test data
pub fn seeded_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(SEED)
}

const AUTHORS: [&str; 4] = ["octocat", "hubot", "monalisa", "defunkt"];

/// Generate a realistic comment list spread over `file_count` files.
///
/// Roughly 30% of the comments are replies to an earlier root.
pub fn generate_comments(count: usize, file_count: usize, max_line: u32) -> Vec<ReviewComment> {
    let mut rng = seeded_rng();
    let mut comments: Vec<ReviewComment> = Vec::with_capacity(count);

    for i in 0..count {
        let id = i as u64 + 1;
        let author = AUTHORS[rng.random_range(0..AUTHORS.len())];
        let reply_to = if !comments.is_empty() && rng.random_range(0..10) < 3 {
            let root = &comments[rng.random_range(0..comments.len())];
            Some(root.in_reply_to_id.unwrap_or(root.id))
        } else {
            None
        };

        let (path, line, side) = match reply_to.and_then(|r| comments.iter().find(|c| c.id == r)) {
            Some(root) => (root.path.clone(), root.line, root.side),
            None => {
                let side = if rng.random_bool(0.8) {
                    Side::Right
                } else {
                    Side::Left
                };
                (
                    format!("src/module_{}.rs", rng.random_range(0..file_count)),
                    Some(rng.random_range(1..=max_line)),
                    Some(side),
                )
            }
        };

        comments.push(ReviewComment {
            id,
            path,
            line,
            side,
            body: format!("Comment {} from {}", id, author),
            user: User {
                login: author.to_string(),
            },
            created_at: "2024-01-01T00:00:00Z".to_string(),
            in_reply_to_id: reply_to,
        });
    }

    comments
}
