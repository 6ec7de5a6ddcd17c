#![cfg(test)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth;
use crate::db::{run_migrations, seed_defaults, DbPool};
use crate::feed;
use crate::models::article::{Article, ArticleFilter, ArticleForm, ArticlePatch};
use crate::models::category::Category;
use crate::models::contact::{ContactForm, ContactMessage};
use crate::models::file::{FileForm, FileRecord};
use crate::models::newsletter::{Campaign, CampaignForm, Subscriber};
use crate::models::settings::Setting;
use crate::models::user::User;
use crate::rate_limit::RateLimiter;
use crate::search::search_articles;

/// Atomic counter for unique shared-cache DB names so parallel tests
/// don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Fresh in-memory pool with migrations + seed defaults applied.
/// Named shared-cache so multiple pool connections see the same data.
/// The admin account is pre-seeded with a cheap bcrypt hash so
/// seed_defaults skips the expensive DEFAULT_COST hash.
fn test_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let uri = format!("file:testdb_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri);
    let pool = Pool::builder()
        .max_size(2)
        .build(manager)
        .expect("Failed to create test pool");
    {
        let conn = pool.get().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    }
    run_migrations(&pool).expect("Failed to run migrations");
    {
        let conn = pool.get().unwrap();
        let fast = bcrypt::hash("admin", 4).unwrap();
        conn.execute(
            "INSERT INTO users (email, password_hash, full_name, role)
             VALUES ('admin@localhost', ?1, 'Admin', 'admin')",
            rusqlite::params![fast],
        )
        .unwrap();
    }
    seed_defaults(&pool).expect("Failed to seed defaults");
    pool
}

/// File-backed pool for the concurrency test: WAL plus a generous
/// busy timeout so writer threads queue instead of erroring.
fn file_test_pool(threads: u32) -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("minbar_test_{}_{}.db", std::process::id(), id));
    let _ = std::fs::remove_file(&path);
    let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
        conn.busy_timeout(std::time::Duration::from_secs(10))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")
    });
    let pool = Pool::builder()
        .max_size(threads + 1)
        .build(manager)
        .expect("Failed to create file test pool");
    run_migrations(&pool).expect("Failed to run migrations");
    pool
}

/// Fast bcrypt hash for tests (cost=4 instead of DEFAULT_COST).
fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

fn make_article_form(title: &str, category: &str, status: &str) -> ArticleForm {
    ArticleForm {
        title: title.to_string(),
        content: Some("Body text".to_string()),
        excerpt: "Excerpt".to_string(),
        category: category.to_string(),
        author: "Author".to_string(),
        translator: None,
        status: status.to_string(),
        article_type: "text".to_string(),
        file_id: None,
    }
}

fn make_file(pool: &DbPool, original_name: &str) -> FileRecord {
    FileRecord::create(
        pool,
        &FileForm {
            name: format!("stored-{}", original_name),
            original_name: original_name.to_string(),
            size_bytes: 1024,
            mime_type: Some("application/pdf".to_string()),
            bucket: "articles".to_string(),
            file_path: format!("website/uploads/stored-{}", original_name),
            public_url: Some(format!("http://localhost:8000/uploads/stored-{}", original_name)),
            uploaded_by: "admin@localhost".to_string(),
        },
    )
    .unwrap()
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_set_and_get() {
    let pool = test_pool();
    Setting::set(&pool, "test_key", "hello").unwrap();
    assert_eq!(Setting::get(&pool, "test_key"), Some("hello".to_string()));
}

#[test]
fn settings_get_or_and_i64() {
    let pool = test_pool();
    assert_eq!(Setting::get_or(&pool, "nope", "fallback"), "fallback");
    assert_eq!(Setting::get_i64(&pool, "articles_per_page"), 10);
    assert_eq!(Setting::get_i64(&pool, "search_result_limit"), 100);
    assert_eq!(Setting::get_i64(&pool, "missing"), 0);
}

#[test]
fn settings_upsert() {
    let pool = test_pool();
    Setting::set(&pool, "key", "first").unwrap();
    Setting::set(&pool, "key", "second").unwrap();
    assert_eq!(Setting::get(&pool, "key"), Some("second".to_string()));
}

// ═══════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════

#[test]
fn categories_seeded_and_ordered() {
    let pool = test_pool();
    let cats = Category::list(&pool);
    assert_eq!(cats.len(), 5);
    // ORDER BY name
    let names: Vec<&str> = cats.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Diplomatiya", "Geografiya", "Iqtisod", "Siyosat", "Tarix"]
    );
}

#[test]
fn category_find_by_slug() {
    let pool = test_pool();
    let cat = Category::find_by_slug(&pool, "siyosat").unwrap();
    assert_eq!(cat.name, "Siyosat");
    assert!(Category::find_by_slug(&pool, "sport").is_none());
}

// ═══════════════════════════════════════════════════════════
// Articles
// ═══════════════════════════════════════════════════════════

#[test]
fn article_crud() {
    let pool = test_pool();

    let created = Article::create(&pool, &make_article_form("Hello", "Siyosat", "draft")).unwrap();
    assert!(created.id > 0);
    assert_eq!(created.title, "Hello");
    assert_eq!(created.status, "draft");
    assert_eq!(created.view_count, 0);

    let found = Article::find(&pool, created.id).unwrap();
    assert_eq!(found.title, "Hello");

    let updated = Article::update(
        &pool,
        created.id,
        &ArticlePatch {
            title: Some("Updated".to_string()),
            status: Some("published".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.title, "Updated");
    assert_eq!(updated.status, "published");
    // untouched fields survive the patch
    assert_eq!(updated.category, "Siyosat");
    assert_eq!(updated.author, "Author");
    assert_eq!(updated.excerpt, "Excerpt");

    Article::delete(&pool, created.id).unwrap();
    assert!(Article::find(&pool, created.id).is_none());
}

#[test]
fn article_update_missing_row_errors() {
    let pool = test_pool();
    let result = Article::update(
        &pool,
        4242,
        &ArticlePatch {
            title: Some("x".to_string()),
            ..Default::default()
        },
    );
    assert!(result.is_err());
}

#[test]
fn file_article_round_trips_without_file_id() {
    let pool = test_pool();

    let mut form = make_article_form("Archive Item", "Tarix", "published");
    form.article_type = "file".to_string();
    form.file_id = None;
    form.translator = Some("T. Olmos".to_string());

    let created = Article::create(&pool, &form).unwrap();
    let read = Article::find(&pool, created.id).unwrap();

    assert_eq!(read.title, "Archive Item");
    assert_eq!(read.article_type, "file");
    assert_eq!(read.file_id, None);
    assert_eq!(read.translator.as_deref(), Some("T. Olmos"));
    assert_eq!(read.content.as_deref(), Some("Body text"));
    assert_eq!(read.view_count, 0);
}

#[test]
fn article_list_ordering_and_filters() {
    let pool = test_pool();

    let a1 = Article::create(&pool, &make_article_form("First", "Siyosat", "published")).unwrap();
    let a2 = Article::create(&pool, &make_article_form("Second", "Iqtisod", "published")).unwrap();
    let a3 = Article::create(&pool, &make_article_form("Third", "Siyosat", "draft")).unwrap();
    let a4 = Article::create(&pool, &make_article_form("Fourth", "Tarix", "published")).unwrap();

    // Newest first
    let all = Article::list(&pool, &ArticleFilter::default());
    let ids: Vec<i64> = all.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![a4.id, a3.id, a2.id, a1.id]);

    // Category filter is exact
    let siyosat = Article::list(
        &pool,
        &ArticleFilter {
            category: Some("Siyosat".to_string()),
            ..Default::default()
        },
    );
    let ids: Vec<i64> = siyosat.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![a3.id, a1.id]);

    // Status filter is exact
    let published = Article::list(
        &pool,
        &ArticleFilter {
            status: Some("published".to_string()),
            ..Default::default()
        },
    );
    let ids: Vec<i64> = published.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![a4.id, a2.id, a1.id]);

    // Combined
    let combined = Article::list(
        &pool,
        &ArticleFilter {
            category: Some("Siyosat".to_string()),
            status: Some("published".to_string()),
            ..Default::default()
        },
    );
    assert_eq!(combined.len(), 1);
    assert_eq!(combined[0].id, a1.id);

    // No match is an empty list, not an error
    let none = Article::list(
        &pool,
        &ArticleFilter {
            category: Some("Sport".to_string()),
            ..Default::default()
        },
    );
    assert!(none.is_empty());
}

#[test]
fn article_offset_without_limit_assumes_page_of_ten() {
    let pool = test_pool();
    for i in 0..17 {
        Article::create(&pool, &make_article_form(&format!("Article {}", i), "Siyosat", "published"))
            .unwrap();
    }

    // offset alone: at most 10 rows, starting at the 6th-newest
    let page = Article::list(
        &pool,
        &ArticleFilter {
            offset: Some(5),
            ..Default::default()
        },
    );
    assert_eq!(page.len(), 10);
    assert_eq!(page[0].title, "Article 11");
    assert_eq!(page[9].title, "Article 2");

    // tail shorter than the implied page
    let tail = Article::list(
        &pool,
        &ArticleFilter {
            offset: Some(15),
            ..Default::default()
        },
    );
    assert_eq!(tail.len(), 2);

    // explicit limit + offset
    let window = Article::list(
        &pool,
        &ArticleFilter {
            limit: Some(3),
            offset: Some(2),
            ..Default::default()
        },
    );
    assert_eq!(window.len(), 3);
    assert_eq!(window[0].title, "Article 14");

    // limit alone
    let top = Article::list(
        &pool,
        &ArticleFilter {
            limit: Some(4),
            ..Default::default()
        },
    );
    assert_eq!(top.len(), 4);
    assert_eq!(top[0].title, "Article 16");
}

#[test]
fn view_count_sequential_increments() {
    let pool = test_pool();
    let article = Article::create(&pool, &make_article_form("Viewed", "Siyosat", "published")).unwrap();

    for expected in 1..=5 {
        let count = Article::increment_views(&pool, article.id).unwrap();
        assert_eq!(count, expected);
    }
    assert_eq!(Article::find(&pool, article.id).unwrap().view_count, 5);
}

#[test]
fn view_count_missing_article_errors() {
    let pool = test_pool();
    assert!(Article::increment_views(&pool, 9999).is_err());
}

/// The counter is a single UPDATE expression evaluated by the store,
/// so concurrent readers cannot lose increments: M racing bumps land
/// as exactly +M.
#[test]
fn view_count_concurrent_increments_are_exact() {
    const THREADS: u32 = 4;
    const PER_THREAD: u32 = 10;

    let pool = file_test_pool(THREADS);
    let article = Article::create(&pool, &make_article_form("Hot", "Siyosat", "published")).unwrap();

    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let pool = pool.clone();
        let id = article.id;
        handles.push(std::thread::spawn(move || {
            for _ in 0..PER_THREAD {
                Article::increment_views(&pool, id).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        Article::find(&pool, article.id).unwrap().view_count,
        (THREADS * PER_THREAD) as i64
    );
}

#[test]
fn article_total_views() {
    let pool = test_pool();
    let a = Article::create(&pool, &make_article_form("A", "Siyosat", "published")).unwrap();
    let b = Article::create(&pool, &make_article_form("B", "Tarix", "draft")).unwrap();

    for _ in 0..3 {
        Article::increment_views(&pool, a.id).unwrap();
    }
    Article::increment_views(&pool, b.id).unwrap();

    assert_eq!(Article::total_views(&pool), 4);
    assert_eq!(Article::count(&pool, None), 2);
    assert_eq!(Article::count(&pool, Some("published")), 1);
    assert_eq!(Article::count(&pool, Some("draft")), 1);
}

// ═══════════════════════════════════════════════════════════
// Files + weak references
// ═══════════════════════════════════════════════════════════

#[test]
fn file_record_crud() {
    let pool = test_pool();

    let file = make_file(&pool, "report.pdf");
    assert!(file.id > 0);
    assert_eq!(file.original_name, "report.pdf");
    assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));

    let found = FileRecord::find(&pool, file.id).unwrap();
    assert_eq!(found.name, "stored-report.pdf");

    let second = make_file(&pool, "notes.pdf");
    let listed = FileRecord::list(&pool);
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id); // newest first
    assert_eq!(FileRecord::count(&pool), 2);

    FileRecord::delete(&pool, file.id).unwrap();
    assert!(FileRecord::find(&pool, file.id).is_none());
    assert_eq!(FileRecord::count(&pool), 1);
}

#[test]
fn file_reference_is_weak_in_both_directions() {
    let pool = test_pool();
    let file = make_file(&pool, "doc.pdf");

    let mut form = make_article_form("Doc", "Siyosat", "published");
    form.article_type = "file".to_string();
    form.file_id = Some(file.id);
    let article = Article::create(&pool, &form).unwrap();

    // Deleting the article leaves the file record alone
    Article::delete(&pool, article.id).unwrap();
    assert!(FileRecord::find(&pool, file.id).is_some());

    // Deleting the file leaves a dangling reference on the article
    let mut form = make_article_form("Doc 2", "Siyosat", "published");
    form.article_type = "file".to_string();
    form.file_id = Some(file.id);
    let orphaned = Article::create(&pool, &form).unwrap();

    FileRecord::delete(&pool, file.id).unwrap();
    let read = Article::find(&pool, orphaned.id).unwrap();
    assert_eq!(read.file_id, Some(file.id));
    assert!(FileRecord::find(&pool, file.id).is_none());

    // A reference to a file that never existed is also representable
    let mut form = make_article_form("Doc 3", "Siyosat", "published");
    form.article_type = "file".to_string();
    form.file_id = Some(12345);
    assert!(Article::create(&pool, &form).is_ok());
}

// ═══════════════════════════════════════════════════════════
// Publish files as articles
// ═══════════════════════════════════════════════════════════

#[test]
fn publish_files_creates_published_file_articles() {
    let pool = test_pool();
    let f1 = make_file(&pool, "Davlat tahlili.pdf");
    let f2 = make_file(&pool, "budget-2026.pdf");
    let f3 = make_file(&pool, "noext");

    let report = Article::publish_from_files(&pool, &[f1.id, f2.id, f3.id]);
    assert_eq!(report.created, 3);
    assert!(report.error.is_none());

    let articles = Article::list(&pool, &ArticleFilter::default());
    assert_eq!(articles.len(), 3);
    for article in &articles {
        assert_eq!(article.status, "published");
        assert_eq!(article.article_type, "file");
        assert_eq!(article.category, "Siyosat"); // configured default
        assert!(article.file_id.is_some());
    }

    // Title is the original name minus its final extension
    let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
    assert!(titles.contains(&"Davlat tahlili"));
    assert!(titles.contains(&"budget-2026"));
    assert!(titles.contains(&"noext"));
}

#[test]
fn publish_files_deduplicates_selection() {
    let pool = test_pool();
    let f1 = make_file(&pool, "one.pdf");
    let f2 = make_file(&pool, "two.pdf");

    let report = Article::publish_from_files(&pool, &[f1.id, f1.id, f2.id, f1.id]);
    assert_eq!(report.created, 2);
    assert!(report.error.is_none());
    assert_eq!(Article::count(&pool, None), 2);
}

#[test]
fn publish_files_skips_unknown_ids_silently() {
    let pool = test_pool();
    let f1 = make_file(&pool, "real.pdf");

    let report = Article::publish_from_files(&pool, &[f1.id, 9999]);
    assert_eq!(report.created, 1);
    assert!(report.error.is_none());
}

/// Fail-fast partial success: the first failing insert stops the
/// loop, earlier articles stay, later files are never attempted.
#[test]
fn publish_files_stops_at_first_failure() {
    let pool = test_pool();
    let f1 = make_file(&pool, "first.pdf");
    let f2 = make_file(&pool, "second.pdf");
    let f3 = make_file(&pool, "third.pdf");

    // Force the second insert to fail
    {
        let conn = pool.get().unwrap();
        conn.execute_batch(&format!(
            "CREATE TRIGGER block_insert BEFORE INSERT ON articles
             WHEN NEW.file_id = {}
             BEGIN SELECT RAISE(ABORT, 'simulated insert failure'); END;",
            f2.id
        ))
        .unwrap();
    }

    let report = Article::publish_from_files(&pool, &[f1.id, f2.id, f3.id]);
    assert_eq!(report.created, 1);
    let error = report.error.unwrap();
    assert!(error.contains("second.pdf"), "error should name the failing file: {}", error);

    // Only the first article exists; the third was never attempted
    let articles = Article::list(&pool, &ArticleFilter::default());
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "first");
}

// ═══════════════════════════════════════════════════════════
// Search
// ═══════════════════════════════════════════════════════════

#[test]
fn search_matches_author_case_insensitively() {
    let pool = test_pool();

    let mut a = make_article_form("Suv resurslari", "Geografiya", "published");
    a.author = "Alisher Navoiy".to_string();
    Article::create(&pool, &a).unwrap();

    let mut b = make_article_form("Savdo yo'llari", "Iqtisod", "published");
    b.author = "Bobur Karimov".to_string();
    Article::create(&pool, &b).unwrap();

    let mut c = make_article_form("Ipak yo'li", "Tarix", "published");
    c.author = "Otabek".to_string();
    Article::create(&pool, &c).unwrap();

    let results = search_articles(&pool, "KARIMOV", 100);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].author, "Bobur Karimov");
}

#[test]
fn search_spans_all_fields_and_statuses() {
    let pool = test_pool();

    Article::create(&pool, &make_article_form("Narxlar tahlili", "Iqtisod", "published")).unwrap();

    let mut draft = make_article_form("Yashirin loyiha", "Siyosat", "draft");
    draft.excerpt = "narxlar haqida".to_string();
    Article::create(&pool, &draft).unwrap();

    let mut no_content = make_article_form("Bo'sh", "Tarix", "published");
    no_content.content = None;
    Article::create(&pool, &no_content).unwrap();

    // Title match + excerpt match; drafts are searched too
    let results = search_articles(&pool, "narxlar", 100);
    assert_eq!(results.len(), 2);

    // Category counts as a searchable field
    let by_category = search_articles(&pool, "iqtisod", 100);
    assert_eq!(by_category.len(), 1);

    // NULL content never matches but never breaks the scan
    let none = search_articles(&pool, "zzz", 100);
    assert!(none.is_empty());
}

#[test]
fn search_blank_query_returns_nothing() {
    let pool = test_pool();
    Article::create(&pool, &make_article_form("Anything", "Siyosat", "published")).unwrap();
    assert!(search_articles(&pool, "", 100).is_empty());
    assert!(search_articles(&pool, "   ", 100).is_empty());
}

#[test]
fn search_respects_result_limit() {
    let pool = test_pool();
    for i in 0..5 {
        Article::create(&pool, &make_article_form(&format!("Match {}", i), "Siyosat", "published"))
            .unwrap();
    }

    let capped = search_articles(&pool, "match", 3);
    assert_eq!(capped.len(), 3);
    // newest first
    assert_eq!(capped[0].title, "Match 4");
}

// ═══════════════════════════════════════════════════════════
// Contact messages
// ═══════════════════════════════════════════════════════════

fn make_contact_form(name: &str, subject: &str) -> ContactForm {
    ContactForm {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        subject: subject.to_string(),
        message: "Salom!".to_string(),
    }
}

#[test]
fn contact_message_lifecycle() {
    let pool = test_pool();

    let msg = ContactMessage::create(&pool, &make_contact_form("Aziz", "Taklif")).unwrap();
    assert_eq!(msg.status, "unread"); // forced on create
    assert_eq!(ContactMessage::unread_count(&pool), 1);

    ContactMessage::update_status(&pool, msg.id, "read").unwrap();
    assert_eq!(ContactMessage::find(&pool, msg.id).unwrap().status, "read");
    assert_eq!(ContactMessage::unread_count(&pool), 0);

    ContactMessage::update_status(&pool, msg.id, "replied").unwrap();
    assert_eq!(ContactMessage::find(&pool, msg.id).unwrap().status, "replied");

    ContactMessage::delete(&pool, msg.id).unwrap();
    assert!(ContactMessage::find(&pool, msg.id).is_none());
}

#[test]
fn contact_message_rejects_unknown_status() {
    let pool = test_pool();
    let msg = ContactMessage::create(&pool, &make_contact_form("Aziz", "Taklif")).unwrap();
    assert!(ContactMessage::update_status(&pool, msg.id, "archived").is_err());
    assert_eq!(ContactMessage::find(&pool, msg.id).unwrap().status, "unread");
}

#[test]
fn contact_messages_list_newest_first() {
    let pool = test_pool();
    let m1 = ContactMessage::create(&pool, &make_contact_form("A", "One")).unwrap();
    let m2 = ContactMessage::create(&pool, &make_contact_form("B", "Two")).unwrap();

    let listed = ContactMessage::list(&pool);
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, m2.id);
    assert_eq!(listed[1].id, m1.id);
}

// ═══════════════════════════════════════════════════════════
// Newsletter subscribers
// ═══════════════════════════════════════════════════════════

#[test]
fn subscribe_and_duplicate_rejection() {
    let pool = test_pool();

    let sub = Subscriber::subscribe(&pool, "reader@example.com", Some("Reader")).unwrap();
    assert_eq!(sub.status, "active");
    assert!(sub.unsubscribed_at.is_none());

    // The uniqueness constraint is the duplicate guard
    let dup = Subscriber::subscribe(&pool, "reader@example.com", None);
    assert!(dup.is_err());
    assert!(dup.unwrap_err().contains("UNIQUE"));

    assert_eq!(Subscriber::active_count(&pool), 1);
}

#[test]
fn unsubscribe_marks_and_timestamps() {
    let pool = test_pool();
    Subscriber::subscribe(&pool, "leaver@example.com", None).unwrap();

    Subscriber::unsubscribe(&pool, "leaver@example.com").unwrap();
    assert_eq!(Subscriber::active_count(&pool), 0);
    assert!(Subscriber::active_list(&pool).is_empty());

    let conn = pool.get().unwrap();
    let (status, unsub_at): (String, Option<String>) = conn
        .query_row(
            "SELECT status, unsubscribed_at FROM newsletter_subscribers WHERE email = 'leaver@example.com'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(status, "unsubscribed");
    assert!(unsub_at.is_some());

    // The row keeps the email, so re-subscribing still collides
    assert!(Subscriber::subscribe(&pool, "leaver@example.com", None).is_err());
}

#[test]
fn unsubscribe_unknown_email_is_ok() {
    let pool = test_pool();
    assert!(Subscriber::unsubscribe(&pool, "ghost@example.com").is_ok());
}

#[test]
fn subscriber_delete() {
    let pool = test_pool();
    let sub = Subscriber::subscribe(&pool, "gone@example.com", None).unwrap();
    Subscriber::delete(&pool, sub.id).unwrap();
    assert_eq!(Subscriber::active_count(&pool), 0);
    // after a hard delete the email is free again
    assert!(Subscriber::subscribe(&pool, "gone@example.com", None).is_ok());
}

// ═══════════════════════════════════════════════════════════
// Newsletter campaigns
// ═══════════════════════════════════════════════════════════

fn make_campaign_form(title: &str) -> CampaignForm {
    CampaignForm {
        title: title.to_string(),
        subject: format!("{} subject", title),
        content: "Campaign body".to_string(),
        r#type: "broadcast".to_string(),
        article_id: None,
        created_by: "admin@localhost".to_string(),
    }
}

#[test]
fn campaign_starts_as_draft() {
    let pool = test_pool();
    let campaign = Campaign::create(&pool, &make_campaign_form("Weekly")).unwrap();
    assert_eq!(campaign.status, "draft");
    assert_eq!(campaign.sent_count, 0);
    assert!(campaign.sent_at.is_none());
    assert_eq!(Campaign::count(&pool), 1);
}

#[test]
fn campaign_sent_transition_stamps_bookkeeping() {
    let pool = test_pool();
    let campaign = Campaign::create(&pool, &make_campaign_form("Launch")).unwrap();

    // 'scheduled' touches only the status
    Campaign::update_status(&pool, campaign.id, "scheduled", None).unwrap();
    let scheduled = Campaign::find(&pool, campaign.id).unwrap();
    assert_eq!(scheduled.status, "scheduled");
    assert!(scheduled.sent_at.is_none());

    // 'sent' stamps sent_at and records the count
    Campaign::update_status(&pool, campaign.id, "sent", Some(42)).unwrap();
    let sent = Campaign::find(&pool, campaign.id).unwrap();
    assert_eq!(sent.status, "sent");
    assert_eq!(sent.sent_count, 42);
    assert!(sent.sent_at.is_some());
}

#[test]
fn campaign_sent_without_count_keeps_previous() {
    let pool = test_pool();
    let campaign = Campaign::create(&pool, &make_campaign_form("Quiet")).unwrap();
    Campaign::update_status(&pool, campaign.id, "sent", None).unwrap();
    let sent = Campaign::find(&pool, campaign.id).unwrap();
    assert_eq!(sent.sent_count, 0);
    assert!(sent.sent_at.is_some());
}

#[test]
fn campaign_rejects_unknown_status() {
    let pool = test_pool();
    let campaign = Campaign::create(&pool, &make_campaign_form("Bad")).unwrap();
    assert!(Campaign::update_status(&pool, campaign.id, "archived", None).is_err());
}

#[test]
fn campaign_delete_and_list() {
    let pool = test_pool();
    let c1 = Campaign::create(&pool, &make_campaign_form("One")).unwrap();
    let c2 = Campaign::create(&pool, &make_campaign_form("Two")).unwrap();

    let listed = Campaign::list(&pool);
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, c2.id); // newest first

    Campaign::delete(&pool, c1.id).unwrap();
    assert_eq!(Campaign::count(&pool), 1);
}

// ═══════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════

#[test]
fn admin_account_is_seeded() {
    let pool = test_pool();
    let admin = User::get_by_email(&pool, "admin@localhost").unwrap();
    assert!(admin.is_admin());
    assert!(auth::verify_password("admin", &admin.password_hash));
}

#[test]
fn user_create_and_lookup() {
    let pool = test_pool();
    let hash = fast_hash("secret123");
    let user = User::create(&pool, "reader@example.com", &hash, Some("Reader"), "reader").unwrap();
    assert!(user.id > 0);
    assert_eq!(user.role, "reader");
    assert!(!user.is_admin());

    let by_email = User::get_by_email(&pool, "reader@example.com").unwrap();
    assert_eq!(by_email.id, user.id);
    let by_id = User::get_by_id(&pool, user.id).unwrap();
    assert_eq!(by_id.email, "reader@example.com");

    assert_eq!(User::count(&pool), 2); // seeded admin + reader
}

#[test]
fn user_unique_email() {
    let pool = test_pool();
    let hash = fast_hash("p");
    User::create(&pool, "dup@example.com", &hash, None, "reader").unwrap();
    let result = User::create(&pool, "dup@example.com", &hash, None, "translator");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("UNIQUE"));
}

#[test]
fn user_safe_json_excludes_password() {
    let pool = test_pool();
    let hash = fast_hash("secret");
    let user = User::create(&pool, "safe@example.com", &hash, Some("Safe"), "reader").unwrap();
    let json = user.safe_json();
    assert!(json.get("password_hash").is_none());
    assert_eq!(json["email"], "safe@example.com");
    assert_eq!(json["role"], "reader");
}

// ═══════════════════════════════════════════════════════════
// Auth: passwords + sessions
// ═══════════════════════════════════════════════════════════

#[test]
fn password_hash_and_verify() {
    let hash = fast_hash("my_secure_password");
    assert!(auth::verify_password("my_secure_password", &hash));
    assert!(!auth::verify_password("wrong_password", &hash));
}

#[test]
fn session_lifecycle() {
    let pool = test_pool();
    let hash = fast_hash("pass");
    let user = User::create(&pool, "sess@example.com", &hash, None, "reader").unwrap();

    let sid = auth::create_session(&pool, user.id, Some("1.2.3.4"), Some("TestAgent")).unwrap();
    assert!(!sid.is_empty());

    assert!(auth::validate_session(&pool, &sid));
    let resolved = auth::get_session_user(&pool, &sid).unwrap();
    assert_eq!(resolved.id, user.id);

    assert!(!auth::validate_session(&pool, "nonexistent"));

    auth::destroy_session(&pool, &sid).unwrap();
    assert!(!auth::validate_session(&pool, &sid));
}

#[test]
fn session_expiry_and_cleanup() {
    let pool = test_pool();
    let hash = fast_hash("pass");
    let user = User::create(&pool, "exp@example.com", &hash, None, "reader").unwrap();

    let live = auth::create_session(&pool, user.id, None, None).unwrap();

    // Insert an already-expired session directly
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, user_id, created_at, expires_at)
             VALUES ('expired-sess', ?1, datetime('now', '-2 days'), datetime('now', '-1 day'))",
            rusqlite::params![user.id],
        )
        .unwrap();
    }

    // Expired session never resolves
    assert!(auth::get_session_user(&pool, "expired-sess").is_none());

    auth::cleanup_expired_sessions(&pool).unwrap();
    assert!(auth::validate_session(&pool, &live));

    let conn = pool.get().unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 1);
}

#[test]
fn ip_hashing_is_deterministic() {
    let h1 = auth::hash_ip("192.168.1.1");
    let h2 = auth::hash_ip("192.168.1.1");
    let h3 = auth::hash_ip("10.0.0.1");
    assert_eq!(h1, h2);
    assert_ne!(h1, h3);
    assert_eq!(h1.len(), 64); // SHA-256 hex
}

// ═══════════════════════════════════════════════════════════
// Rate limiter
// ═══════════════════════════════════════════════════════════

#[test]
fn rate_limiter_blocks_over_limit() {
    let limiter = RateLimiter::new();
    let window = std::time::Duration::from_secs(60);

    for _ in 0..3 {
        assert!(limiter.allow("signin:abc", 3, window));
    }
    assert!(!limiter.allow("signin:abc", 3, window));

    // Separate keys have separate budgets
    assert!(limiter.allow("signin:other", 3, window));
    assert!(limiter.allow("contact:abc", 3, window));
}

#[test]
fn rate_limiter_sweep_clears_stale_keys() {
    let limiter = RateLimiter::new();
    let window = std::time::Duration::from_millis(10);
    assert!(limiter.allow("k", 1, window));

    std::thread::sleep(std::time::Duration::from_millis(20));
    limiter.sweep(window);

    // The window has passed; the key admits attempts again
    assert!(limiter.allow("k", 1, window));
}

// ═══════════════════════════════════════════════════════════
// Feed
// ═══════════════════════════════════════════════════════════

#[test]
fn feed_lists_published_only_and_escapes() {
    let pool = test_pool();

    Article::create(&pool, &make_article_form("Savdo & Sanoat", "Iqtisod", "published")).unwrap();
    Article::create(&pool, &make_article_form("Qoralama", "Siyosat", "draft")).unwrap();

    let xml = feed::generate_feed(&pool);
    assert!(xml.starts_with("<?xml"));
    assert!(xml.contains("<rss version=\"2.0\""));
    assert!(xml.contains("Savdo &amp; Sanoat"));
    assert!(!xml.contains("Qoralama"));
    // Item links follow the reader routes with a slugified category
    assert!(xml.contains("/article/iqtisod/"));
}

#[test]
fn feed_is_well_formed_when_empty() {
    let pool = test_pool();
    let xml = feed::generate_feed(&pool);
    assert!(xml.contains("<channel>"));
    assert!(xml.ends_with("</channel>\n</rss>"));
    assert!(!xml.contains("<item>"));
}
