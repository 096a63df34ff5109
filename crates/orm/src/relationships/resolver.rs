//! Join planning - connects a set of joined entities with declared relationships
//!
//! Edges are always oriented `from → to`. When only `to` declares the link,
//! its declaration is inverted. Among several declarations linking the same
//! two tables, the first declared wins.

use std::sync::Arc;

use tracing::trace;

use super::metadata::Relationship;
use crate::error::RelationshipError;
use crate::model::EntityDescriptor;

/// Relationship connecting `from` to `to`, declared on either side
///
/// The result's `self_*` side is always `from` and the `target_*` side `to`.
pub fn find_relationship_between(
    from: &EntityDescriptor,
    to: &EntityDescriptor,
) -> Result<Relationship, RelationshipError> {
    let forward = from.relationships();
    let reverse = to.relationships();

    if forward.is_none() && reverse.is_none() {
        return Err(RelationshipError::NotRelationshipCapable {
            from: from.type_name().to_string(),
            to: to.type_name().to_string(),
        });
    }

    if let Some(declared) = forward
        .unwrap_or_default()
        .iter()
        .find(|rel| rel.target_table == to.table())
    {
        return Ok(Relationship::new(
            from.table(),
            declared.self_column.clone(),
            to.table(),
            declared.target_column.clone(),
        ));
    }

    if let Some(declared) = reverse
        .unwrap_or_default()
        .iter()
        .find(|rel| rel.target_table == from.table())
    {
        let inverted = declared.inverted();
        return Ok(Relationship::new(
            from.table(),
            inverted.self_column,
            to.table(),
            inverted.target_column,
        ));
    }

    Err(RelationshipError::NoRelationship {
        from: from.type_name().to_string(),
        to: to.type_name().to_string(),
    })
}

/// Spanning sequence of join edges over `entities`, in a stable order
///
/// The first edge introduces two entities; every later edge starts from an
/// entity already connected and brings in one new entity, so the edges can be
/// rendered as a single `FROM ... JOIN ... JOIN ...` chain. Fewer than two
/// entities need no edges.
pub fn plan_joins(entities: &[Arc<EntityDescriptor>]) -> Result<Vec<Relationship>, RelationshipError> {
    let count = entities.len();
    let mut edges = Vec::with_capacity(count.saturating_sub(1));
    if count < 2 {
        return Ok(edges);
    }

    let mut connected = vec![false; count];
    let mut remaining = count;

    while remaining > 0 {
        let mut failure: Option<RelationshipError> = None;
        let mut found = None;

        'search: for to in 0..count {
            if connected[to] {
                continue;
            }
            for from in 0..count {
                if from == to || (!edges.is_empty() && !connected[from]) {
                    continue;
                }
                match find_relationship_between(&entities[from], &entities[to]) {
                    Ok(edge) => {
                        found = Some((from, to, edge));
                        break 'search;
                    }
                    Err(err) => {
                        let more_specific = matches!(err, RelationshipError::NoRelationship { .. })
                            && !matches!(failure, Some(RelationshipError::NoRelationship { .. }));
                        if failure.is_none() || more_specific {
                            failure = Some(err);
                        }
                    }
                }
            }
        }

        let Some((from, to, edge)) = found else {
            return Err(failure.unwrap_or_else(|| {
                let stranded = entities
                    .iter()
                    .zip(&connected)
                    .find(|(_, done)| !**done)
                    .map(|(desc, _)| desc.type_name())
                    .unwrap_or_default();
                RelationshipError::NoRelationship {
                    from: stranded.to_string(),
                    to: stranded.to_string(),
                }
            }));
        };

        trace!(
            from = %edge.self_table,
            to = %edge.target_table,
            "join edge planned"
        );
        for index in [from, to] {
            if !connected[index] {
                connected[index] = true;
                remaining -= 1;
            }
        }
        edges.push(edge);
    }

    Ok(edges)
}
