use crate::math::{Real, Vector};

/// Computes two unit vectors orthogonal to `n` and to each other.
///
/// `n` must be normalized. The returned pair `[u, v]` is such that `(u, v, n)` is a
/// right-handed frame.
// Building an Orthonormal Basis, Revisited, Duff et al. 2017.
pub fn orthonormal_basis(n: &Vector<Real>) -> [Vector<Real>; 2] {
    let sign = n.z.signum();
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;

    [
        Vector::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
        Vector::new(b, sign + n.y * n.y * a, -n.y),
    ]
}

#[cfg(test)]
mod test {
    use super::orthonormal_basis;
    use crate::math::Vector;

    #[test]
    fn basis_is_orthonormal_and_right_handed() {
        for n in [
            Vector::z(),
            -Vector::z(),
            Vector::x(),
            Vector::new(1.0, -2.0, 0.5).normalize(),
        ] {
            let [u, v] = orthonormal_basis(&n);
            assert_relative_eq!(u.norm(), 1.0, epsilon = 1.0e-10);
            assert_relative_eq!(v.norm(), 1.0, epsilon = 1.0e-10);
            assert_relative_eq!(u.dot(&v), 0.0, epsilon = 1.0e-10);
            assert_relative_eq!(u.cross(&v), n, epsilon = 1.0e-10);
        }
    }
}
