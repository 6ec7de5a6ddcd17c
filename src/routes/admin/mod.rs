pub mod articles;
pub mod dashboard;
pub mod files;
pub mod messages;
pub mod newsletter;

pub fn routes() -> Vec<rocket::Route> {
    let mut all = Vec::new();
    all.extend(dashboard::routes());
    all.extend(articles::routes());
    all.extend(files::routes());
    all.extend(messages::routes());
    all.extend(newsletter::routes());
    all
}
