pub mod link;

pub use link::{
    ClickEvent, CreateLinkRequest, DayCount, Link, LinkPatch, NewClickEvent, NewLink, OwnerStats,
};
