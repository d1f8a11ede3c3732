//! Database entities

pub mod node;
pub mod tunnel;

pub use node::Entity as Node;
pub use tunnel::Entity as Tunnel;

pub mod prelude {
    pub use super::node::Entity as Node;
    pub use super::tunnel::Entity as Tunnel;
}
