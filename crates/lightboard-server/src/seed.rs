//! First-run demo data.
//!
//! Runs once against an empty database (any existing user disables it) so a
//! fresh checkout serves something browsable immediately.

use lightboard_store::PostContent;

use crate::api::AppState;
use crate::auth::hash_password;
use crate::og::{extract_first_url, fetch_og};

struct SamplePost {
    board_slug: &'static str,
    author: &'static str,
    title: &'static str,
    body_md: &'static str,
}

const SAMPLE_POSTS: &[SamplePost] = &[
    SamplePost {
        board_slug: "free",
        author: "alice",
        title: "Axum + SQLite as a lightweight board stack",
        body_md: "# Notes\n\nA single SQLite file plus axum goes surprisingly far.\nReference: https://docs.rs/axum\n",
    },
    SamplePost {
        board_slug: "qna",
        author: "bob",
        title: "How does SQLite FTS5 hold up in practice?",
        body_md: "Thinking about using FTS5 for post search.\nDocs: https://www.sqlite.org/fts5.html\n",
    },
    SamplePost {
        board_slug: "notice",
        author: "admin",
        title: "[Notice] Demo data is seeded automatically",
        body_md: "On first start the server creates sample users, boards, and posts.\nSecurity reading: https://owasp.org/www-project-top-ten/\n",
    },
];

/// Seed demo users, boards, posts, a like, and a comment thread.
pub async fn seed_demo_data(state: &AppState) -> anyhow::Result<()> {
    {
        let db = state.db.lock().await;
        if db.user_count()? > 0 {
            return Ok(());
        }
    }

    tracing::info!("seeding demo data");

    // Previews are fetched before taking the store lock; offline startup
    // simply yields posts without previews.
    let mut previews = Vec::with_capacity(SAMPLE_POSTS.len());
    for sample in SAMPLE_POSTS {
        let preview = match extract_first_url(sample.body_md) {
            Some(url) => fetch_og(&state.http, url).await,
            None => Default::default(),
        };
        previews.push(preview);
    }

    let mut db = state.db.lock().await;

    let admin = db.create_user("admin", &hash_password("admin123")?, true)?;
    let alice = db.create_user("alice", &hash_password("alice123")?, false)?;
    let bob = db.create_user("bob", &hash_password("bob123")?, false)?;

    db.create_board("General", "Casual, anything goes", "free")?;
    db.create_board("Q&A", "Questions and answers", "qna")?;
    db.create_board("Announcements", "Operational notices", "notice")?;

    let mut first_post_id = None;
    for (sample, preview) in SAMPLE_POSTS.iter().zip(previews) {
        let board = db.get_board_by_slug(sample.board_slug)?;
        let author = match sample.author {
            "admin" => &admin,
            "alice" => &alice,
            _ => &bob,
        };
        let record = db.create_post(
            board.id,
            author.id,
            &PostContent {
                title: sample.title.to_string(),
                body_md: sample.body_md.to_string(),
                og_url: preview.url,
                og_title: preview.title,
                og_image: preview.image,
            },
        )?;
        first_post_id.get_or_insert(record.post.id);
    }

    let Some(first_post_id) = first_post_id else {
        return Ok(());
    };
    db.toggle_like(first_post_id, bob.id)?;

    let root = db.create_comment(
        first_post_id,
        bob.id,
        None,
        "Nice combination, I will give it a try over the weekend.",
    )?;
    db.create_comment(
        first_post_id,
        alice.id,
        Some(root.comment.id),
        "Please share the results when you do!",
    )?;

    tracing::info!("demo data seeded");
    Ok(())
}
