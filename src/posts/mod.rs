pub mod page;
pub mod rpc;
pub mod store;
pub mod view;

pub use rpc::PostWithAuthor;
pub use store::Post;
