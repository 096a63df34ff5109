//! Materialized rows and the typed containers they are written into

use std::any::TypeId;
use std::collections::HashMap;

use crate::error::{OrmError, OrmResult};
use crate::model::{DynEntity, Entity};

/// One result row split into its joined entities
#[derive(Default)]
pub struct MaterializedRow {
    entities: HashMap<TypeId, Box<dyn DynEntity>>,
}

impl std::fmt::Debug for MaterializedRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializedRow")
            .field("entities", &self.entities.len())
            .finish()
    }
}

impl MaterializedRow {
    pub(crate) fn insert(&mut self, type_id: TypeId, entity: Box<dyn DynEntity>) {
        self.entities.insert(type_id, entity);
    }

    /// Move the `E` instance out of the row
    pub fn take<E: Entity>(&mut self) -> Option<E> {
        let entity = self.entities.remove(&TypeId::of::<E>())?;
        entity.into_any().downcast::<E>().ok().map(|boxed| *boxed)
    }

    pub fn contains<E: Entity>(&self) -> bool {
        self.entities.contains_key(&TypeId::of::<E>())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Typed container rows can be written into
///
/// Implemented for `Vec<E>` and for tuples of destinations, so one row can
/// fill several containers at once:
///
/// ```ignore
/// let mut out: (Vec<Post>, Vec<User>) = Default::default();
/// results.write_all_to(&mut out).await?;
/// ```
pub trait Destination: Default + Send {
    /// Take this destination's entities out of `row`
    fn accept(&mut self, row: &mut MaterializedRow) -> OrmResult<()>;

    /// Move everything staged in `other` into `self`
    fn merge(&mut self, other: Self);
}

impl<E: Entity> Destination for Vec<E> {
    fn accept(&mut self, row: &mut MaterializedRow) -> OrmResult<()> {
        let entity = row.take::<E>().ok_or_else(|| {
            OrmError::Materialization(format!("Result row holds no '{}' entity", E::type_name()))
        })?;
        self.push(entity);
        Ok(())
    }

    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

macro_rules! tuple_destination {
    ($($name:ident : $index:tt),+) => {
        impl<$($name: Destination),+> Destination for ($($name,)+) {
            fn accept(&mut self, row: &mut MaterializedRow) -> OrmResult<()> {
                $( self.$index.accept(row)?; )+
                Ok(())
            }

            fn merge(&mut self, other: Self) {
                $( self.$index.merge(other.$index); )+
            }
        }
    };
}

tuple_destination!(A: 0, B: 1);
tuple_destination!(A: 0, B: 1, C: 2);
tuple_destination!(A: 0, B: 1, C: 2, D: 3);
