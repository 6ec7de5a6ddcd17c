use chrono::{DateTime, Utc};

use crate::db::DbPool;
use crate::models::article::{Article, ArticleFilter};
use crate::models::settings::Setting;

/// RSS 2.0 feed of the latest published articles. Item links follow
/// the public reader routes: {site_url}/article/{category-slug}/{id}.
pub fn generate_feed(pool: &DbPool) -> String {
    let site_name = Setting::get_or(pool, "site_name", "Minbar");
    let site_url = Setting::get_or(pool, "site_url", "http://localhost:8000");
    let site_caption = Setting::get_or(pool, "site_caption", "");

    let item_count = Setting::get_or(pool, "feed_item_count", "25")
        .parse::<i64>()
        .unwrap_or(25)
        .clamp(1, 100);

    let articles = Article::list(
        pool,
        &ArticleFilter {
            status: Some("published".to_string()),
            limit: Some(item_count),
            ..Default::default()
        },
    );

    let format_rfc2822 = |ndt: chrono::NaiveDateTime| -> String {
        let utc: DateTime<Utc> = DateTime::from_naive_utc_and_offset(ndt, Utc);
        utc.format("%a, %d %b %Y %H:%M:%S +0000").to_string()
    };

    let last_build = articles
        .first()
        .map(|a| format!("    <lastBuildDate>{}</lastBuildDate>\n", format_rfc2822(a.created_at)))
        .unwrap_or_default();

    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel>
    <title>{title}</title>
    <link>{url}</link>
    <description>{desc}</description>
    <atom:link href="{url}/feed" rel="self" type="application/rss+xml"/>
    <language>uz</language>
{last_build}"#,
        title = xml_escape(&site_name),
        url = xml_escape(&site_url),
        desc = xml_escape(&site_caption),
        last_build = last_build,
    );

    for article in &articles {
        let link = format!(
            "{}/article/{}/{}",
            site_url,
            slug::slugify(&article.category),
            article.id
        );

        xml.push_str(&format!(
            r#"    <item>
        <title>{title}</title>
        <link>{link}</link>
        <guid isPermaLink="true">{link}</guid>
        <pubDate>{date}</pubDate>
        <description>{desc}</description>
    </item>
"#,
            title = xml_escape(&article.title),
            link = xml_escape(&link),
            date = format_rfc2822(article.created_at),
            desc = xml_escape(&article.excerpt),
        ));
    }

    xml.push_str("</channel>\n</rss>");
    xml
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
