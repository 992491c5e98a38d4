use std::borrow::Cow;

use crate::{Kv, KvMode, Result};

/// A value that can be visited by a [`Kv`] in either direction.
///
/// `Vec<T>` maps to an array of `T`, so nested vectors become nested
/// arrays.
pub trait KvVal<'a> {
    fn kv_val(&mut self, kv: &mut Kv<'a>) -> Result<()>;
}

macro_rules! impl_kv_val {
    ($($ty:ty => $method:ident),* $(,)?) => {$(
        impl<'a> KvVal<'a> for $ty {
            fn kv_val(&mut self, kv: &mut Kv<'a>) -> Result<()> {
                kv.$method(self)
            }
        }
    )*};
}

impl_kv_val! {
    i8 => val_i8,
    i16 => val_i16,
    i32 => val_i32,
    i64 => val_i64,
    u8 => val_u8,
    u16 => val_u16,
    u32 => val_u32,
    u64 => val_u64,
    f32 => val_f32,
    f64 => val_f64,
    bool => val_bool,
    String => val_string,
}

impl<'a> KvVal<'a> for Cow<'a, str> {
    fn kv_val(&mut self, kv: &mut Kv<'a>) -> Result<()> {
        kv.val_str(self)
    }
}

/// Bytes stored as a base64 string rather than an array of integers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

impl<'a> KvVal<'a> for Blob {
    fn kv_val(&mut self, kv: &mut Kv<'a>) -> Result<()> {
        kv.val_blob(&mut self.0)
    }
}

impl<'a, T: KvVal<'a> + Default> KvVal<'a> for Vec<T> {
    fn kv_val(&mut self, kv: &mut Kv<'a>) -> Result<()> {
        let mut count = self.len();
        kv.array_begin(&mut count, None)?;
        if kv.mode() == KvMode::Read {
            self.clear();
            self.resize_with(count, T::default);
        }
        for item in self.iter_mut() {
            item.kv_val(kv)?;
        }
        kv.array_end()
    }
}
