use chrono::{DateTime, Utc};

use crate::{
    domain::{MonitorState, Post},
    timeline::time,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    New(DateTime<Utc>),
    AlreadySeen,
    BeforeStart(DateTime<Utc>),
    /// Time label could not be resolved; never alerted.
    Unparsable,
}

pub fn classify(post: &Post, state: &MonitorState, now: DateTime<Utc>) -> Verdict {
    if state.has_seen(&post.id) {
        return Verdict::AlreadySeen;
    }
    match time::normalize(&post.time_token, now) {
        Some(published) if published > state.start_time() => Verdict::New(published),
        Some(published) => Verdict::BeforeStart(published),
        None => Verdict::Unparsable,
    }
}

pub fn is_new(post: &Post, state: &MonitorState, now: DateTime<Utc>) -> bool {
    matches!(classify(post, state, now), Verdict::New(_))
}

pub fn mark_seen(post: &Post, state: &mut MonitorState) {
    state.insert_seen(&post.id);
}
