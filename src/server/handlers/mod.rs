mod info;
mod sync;

pub(crate) use self::info::info;
pub(crate) use self::sync::sync;
