mod collection;
mod fetch;
mod ignore;
mod overrides;
mod search;
mod validate;

pub use collection::*;
pub use fetch::*;
pub use ignore::*;
pub use overrides::*;
pub use search::*;
pub use validate::*;
