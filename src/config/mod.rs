pub mod config_base;
pub mod grant;
pub mod principal;
pub mod privilege;
pub mod target;

pub use config_base::Config;
pub use grant::Grant;
pub use principal::Principal;
pub use privilege::{Privilege, PrivilegeSet};
pub use target::Target;
