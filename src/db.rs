use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_pool() -> Result<DbPool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all("website/db")?;
    std::fs::create_dir_all("website/uploads")?;

    let manager = SqliteConnectionManager::file("website/db/minbar.db");
    let pool = Pool::builder().max_size(10).build(manager)?;

    // WAL for concurrent readers; FK enforcement for sessions → users
    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Published content. file_id is a weak reference into files:
        -- deliberately no FK, so a file row can be removed out from
        -- under an article (dangling references are the caller's
        -- problem, matching the storage service this replaces).
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT,
            excerpt TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL,
            author TEXT NOT NULL,
            translator TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            article_type TEXT NOT NULL DEFAULT 'text',
            file_id INTEGER,
            view_count INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Reference data, seeded below, not mutated by any flow
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '',
            icon TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Metadata for documents in the upload store
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            original_name TEXT NOT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            mime_type TEXT,
            bucket TEXT NOT NULL,
            file_path TEXT NOT NULL,
            public_url TEXT,
            uploaded_by TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS contact_messages (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            subject TEXT NOT NULL,
            message TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'unread',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- UNIQUE(email) is the only duplicate-subscription guard
        CREATE TABLE IF NOT EXISTS newsletter_subscribers (
            id INTEGER PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            name TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            subscribed_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            unsubscribed_at DATETIME
        );

        -- Campaigns are status bookkeeping only; nothing sends mail
        CREATE TABLE IF NOT EXISTS newsletter_campaigns (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            subject TEXT NOT NULL,
            content TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'broadcast',
            article_id INTEGER,
            status TEXT NOT NULL DEFAULT 'draft',
            sent_count INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            sent_at DATETIME
        );

        -- Identity and profile in one row
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            full_name TEXT,
            role TEXT NOT NULL DEFAULT 'reader',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            created_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id)
        );

        -- Settings (key-value)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_articles_category ON articles(category);
        CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
        CREATE INDEX IF NOT EXISTS idx_articles_created ON articles(created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_status ON contact_messages(status);
        CREATE INDEX IF NOT EXISTS idx_subscribers_status ON newsletter_subscribers(status);
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        // General
        ("site_name", "Minbar"),
        ("site_caption", "Tahlil va tarjima maqolalar"),
        ("site_url", "http://localhost:8000"),
        // Content
        ("articles_per_page", "10"),
        ("default_category", "Siyosat"),
        ("default_author", "Admin"),
        ("search_result_limit", "100"),
        ("feed_item_count", "25"),
        // Uploads
        ("uploads_path", "website/uploads"),
        ("uploads_bucket", "articles"),
        // Security
        ("session_expiry_hours", "24"),
        ("login_rate_limit", "5"),
        ("contact_rate_limit", "5"),
        ("subscribe_rate_limit", "5"),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    // Seed the category taxonomy if the table is empty
    let category_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))?;

    if category_count == 0 {
        let categories = [
            ("Siyosat", "siyosat", "Siyosiy tahlil va sharhlar", "#b91c1c", "landmark"),
            ("Iqtisod", "iqtisod", "Iqtisodiy maqolalar", "#047857", "trending-up"),
            ("Geografiya", "geografiya", "Geografik tadqiqotlar", "#1d4ed8", "globe"),
            ("Tarix", "tarix", "Tarixiy maqolalar", "#b45309", "scroll"),
            ("Diplomatiya", "diplomatiya", "Xalqaro munosabatlar", "#6d28d9", "handshake"),
        ];
        for (name, slug, description, color, icon) in categories {
            conn.execute(
                "INSERT INTO categories (name, slug, description, color, icon)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![name, slug, description, color, icon],
            )?;
        }
    }

    // Seed an admin account if none exists.
    // Default password: "admin". Must be changed on first login.
    let admin_count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'admin'",
        [],
        |row| row.get(0),
    )?;

    if admin_count == 0 {
        let hash = bcrypt::hash("admin", bcrypt::DEFAULT_COST)
            .expect("Failed to hash default admin password");
        conn.execute(
            "INSERT INTO users (email, password_hash, full_name, role)
             VALUES ('admin@localhost', ?1, 'Admin', 'admin')",
            params![hash],
        )?;
    }

    Ok(())
}
