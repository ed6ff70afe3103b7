pub mod amqp;
pub mod sign;
pub mod system;
pub mod urp;

pub use amqp::{publish_pubsub, publish_simple, publish_topic, publish_work};
pub use sign::{sign_in, sign_out, sign_up};
pub use system::health;
pub use urp::{bind_permission_to_role, bind_role_to_user, page_permissions, page_roles, page_users};
