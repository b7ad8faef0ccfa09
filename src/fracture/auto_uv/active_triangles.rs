use crate::collection::GeometryCollection;
use crate::utils::hashmap::HashSet;

/// Which faces an automatic UV operation applies to, based on their material.
///
/// Invisible faces are never selected.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum UseMaterials {
    /// Every face.
    All,
    /// Faces with an odd material, which are the internal faces created by cuts.
    #[default]
    Odd,
    /// Only the faces whose material is in the explicit list.
    Listed,
}

// Faces selected by `pattern` are "inside". With `activate_inside == false` the selection is
// inverted, except that `UseMaterials::All` then selects nothing.
pub(super) fn is_triangle_active(
    visible: bool,
    material: i32,
    listed: &HashSet<i32>,
    activate_inside: bool,
    pattern: UseMaterials,
) -> bool {
    if !visible {
        return false;
    }

    match pattern {
        UseMaterials::All if activate_inside => return true,
        UseMaterials::Odd if (material % 2 == 1) == activate_inside => return true,
        _ => {}
    }

    !listed.is_empty() && listed.contains(&material) == activate_inside
}

/// Flags the faces of `collection` an automatic UV operation applies to.
///
/// A face is active if it is visible and selected by `pattern`, or if its material is in
/// `listed_materials`. If `activate_inside` is `false`, the faces *not* selected that way are
/// the active ones. Returns one flag per face and the number of active faces.
pub fn set_active_triangles(
    collection: &GeometryCollection,
    activate_inside: bool,
    pattern: UseMaterials,
    listed_materials: &[i32],
) -> (Vec<bool>, usize) {
    let listed: HashSet<i32> = listed_materials.iter().copied().collect();
    let active: Vec<bool> = collection
        .visible
        .iter()
        .zip(&collection.material_id)
        .map(|(visible, material)| {
            is_triangle_active(*visible, *material, &listed, activate_inside, pattern)
        })
        .collect();
    let num_active = active.iter().filter(|a| **a).count();
    (active, num_active)
}

#[cfg(test)]
mod test {
    use super::{is_triangle_active, UseMaterials};
    use crate::utils::hashmap::HashSet;

    #[test]
    fn selection_by_material() {
        let none = HashSet::default();
        let listed: HashSet<i32> = [4].into_iter().collect();

        assert!(is_triangle_active(true, 3, &none, true, UseMaterials::Odd));
        assert!(!is_triangle_active(true, 2, &none, true, UseMaterials::Odd));
        assert!(is_triangle_active(true, 2, &none, false, UseMaterials::Odd));
        assert!(!is_triangle_active(false, 3, &none, true, UseMaterials::Odd));

        assert!(is_triangle_active(true, 2, &none, true, UseMaterials::All));
        assert!(!is_triangle_active(true, 2, &none, false, UseMaterials::All));

        assert!(is_triangle_active(true, 4, &listed, true, UseMaterials::Listed));
        assert!(!is_triangle_active(true, 3, &listed, true, UseMaterials::Listed));
        assert!(is_triangle_active(true, 3, &listed, false, UseMaterials::Listed));
        assert!(!is_triangle_active(true, 5, &none, true, UseMaterials::Listed));
    }
}
