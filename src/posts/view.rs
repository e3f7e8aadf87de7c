use crate::{include_res, posts::PostWithAuthor};

pub(crate) fn feed_html(entries: &[PostWithAuthor]) -> String {
    entries.iter().map(post_html).collect()
}

pub(crate) fn post_html(entry: &PostWithAuthor) -> String {
    let username = entry.author.username.as_deref().unwrap_or("?");

    include_res!(str, "/pages/post_item.html")
        .replace("{avatar}", &entry.author.profile_image_url)
        .replace("{username}", username)
        .replace("{id}", &entry.post.id)
        .replace(
            "{when}",
            &relative_time(entry.post.created_at, super::store::now_millis()),
        )
        .replace("{content}", &entry.post.content)
}

/// Coarse "x ago" rendering for post timestamps.
pub(crate) fn relative_time(created_at: i64, now: i64) -> String {
    let secs = (now - created_at).max(0) / 1000;

    if secs < 45 {
        return "a few seconds ago".to_owned();
    }
    if secs < 90 {
        return "a minute ago".to_owned();
    }

    let mins = (secs + 30) / 60;
    if mins < 45 {
        return format!("{mins} minutes ago");
    }
    if mins < 90 {
        return "an hour ago".to_owned();
    }

    let hours = (mins + 30) / 60;
    if hours < 22 {
        return format!("{hours} hours ago");
    }
    if hours < 36 {
        return "a day ago".to_owned();
    }

    let days = (hours + 12) / 24;
    if days < 26 {
        return format!("{days} days ago");
    }
    if days < 46 {
        return "a month ago".to_owned();
    }
    if days < 320 {
        return format!("{} months ago", (days + 15) / 30);
    }
    if days < 548 {
        return "a year ago".to_owned();
    }
    format!("{} years ago", (days + 182) / 365)
}
