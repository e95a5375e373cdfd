//! `serde` support: handles serialize as their payload, null as `none`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Prc, Rc};

impl<T: Serialize> Serialize for Rc<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Rc::get(self).serialize(serializer)
    }
}

impl<T: ?Sized + Serialize> Serialize for Prc<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Prc::get(self).serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de> + 'static> Deserialize<'de> for Rc<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or_else(Rc::null, Rc::new))
    }
}

impl<'de, T: Deserialize<'de> + 'static> Deserialize<'de> for Prc<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or_else(Prc::null, Prc::new))
    }
}
