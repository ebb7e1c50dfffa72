use std::path::{Path, PathBuf};

/// Emptiness check applied to the primary argument of a validated operation.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for str {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.as_str().is_blank()
    }
}

impl Blank for Path {
    fn is_blank(&self) -> bool {
        self.as_os_str().is_empty()
    }
}

impl Blank for PathBuf {
    fn is_blank(&self) -> bool {
        self.as_path().is_blank()
    }
}

impl<T: Blank + ?Sized> Blank for &T {
    fn is_blank(&self) -> bool {
        (**self).is_blank()
    }
}

impl<T: Blank> Blank for Option<T> {
    fn is_blank(&self) -> bool {
        match self {
            Some(v) => v.is_blank(),
            None => true,
        }
    }
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

// the first element is the primary argument
impl<A: Blank, B> Blank for (A, B) {
    fn is_blank(&self) -> bool {
        self.0.is_blank()
    }
}

/// Stringified form of an argument list, used to key cached results.
pub trait CacheKey {
    fn cache_key(&self) -> String;
}

impl CacheKey for str {
    fn cache_key(&self) -> String {
        format!("{:?}", self)
    }
}

impl CacheKey for String {
    fn cache_key(&self) -> String {
        self.as_str().cache_key()
    }
}

impl CacheKey for PathBuf {
    fn cache_key(&self) -> String {
        format!("{:?}", self)
    }
}

impl<T: CacheKey + ?Sized> CacheKey for &T {
    fn cache_key(&self) -> String {
        (**self).cache_key()
    }
}

impl<T: CacheKey> CacheKey for Option<T> {
    fn cache_key(&self) -> String {
        match self {
            Some(v) => format!("Some({})", v.cache_key()),
            None => "None".to_string(),
        }
    }
}

impl<A: CacheKey, B: CacheKey> CacheKey for (A, B) {
    fn cache_key(&self) -> String {
        format!("({}, {})", self.0.cache_key(), self.1.cache_key())
    }
}

macro_rules! display_cache_key {
    ($($ty:ty),*) => {
        $(
            impl CacheKey for $ty {
                fn cache_key(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

display_cache_key!(bool, u8, u16, u32, u64, usize, i32, i64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_is_blank() {
        assert!("".is_blank());
        assert!(" \t\n".is_blank());
        assert!(!" a red bicycle ".is_blank());
        assert!(None::<String>.is_blank());
        assert!(Some(String::from("  ")).is_blank());
        assert!(Vec::<u8>::new().is_blank());
        assert!(PathBuf::new().is_blank());
        assert!((String::new(), 3usize).is_blank());
        assert!(!(String::from("cat"), 0usize).is_blank());
    }

    #[test]
    fn cache_keys_distinguish_arguments() {
        let a = (String::from("cat"), 2usize).cache_key();
        let b = (String::from("cat"), 3usize).cache_key();
        assert_ne!(a, b);
        assert_eq!(a, (String::from("cat"), 2usize).cache_key());
        assert_ne!(Some(String::new()).cache_key(), None::<String>.cache_key());
    }
}
