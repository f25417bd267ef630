//! Service layer shared by the crawl executors

pub mod member_service;
pub mod message_link_service;

pub use member_service::MemberService;
pub use message_link_service::MessageLinkService;
