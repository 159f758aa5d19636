//! Angular momentum quantum numbers stored as integer numbers of halves.
//!
//! Every projection and total used by the label space is kept as `2 × value`
//! so that half-integer nuclear spins stay exact.

/// A single spin-projection quantum number, stored as a number of halves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpinProj(i32);

impl SpinProj {
    pub fn new(m: i32) -> Self { Self(m) }

    /// Return `self` shifted by a number of halves, saturating at the bounds of
    /// `i32`.
    pub fn shifted(self, dm: i32) -> Self { Self(self.0.saturating_add(dm)) }

    pub fn halves(self) -> i32 { self.0 }
}

impl std::ops::Add for SpinProj {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output { Self(self.0 + rhs.0) }
}

impl std::fmt::Display for SpinProj {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 % 2 == 0 {
            write!(f, "{}", self.0 / 2)
        } else {
            write!(f, "{}/2", self.0)
        }
    }
}

/// A total angular momentum, stored as a number of halves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpinTotal(u32);

impl SpinTotal {
    pub fn new(j: u32) -> Self { Self(j) }

    /// Total of an integer angular momentum `l`, e.g. a rotational number.
    pub fn integer(l: u32) -> Self { Self(2 * l) }

    pub fn halves(self) -> u32 { self.0 }

    /// Number of projection states, `2j + 1`.
    pub fn multiplicity(self) -> usize { self.0 as usize + 1 }

    /// Return `true` if `m` lies in `[-j, j]` with matching parity.
    pub fn admits(self, m: SpinProj) -> bool {
        let j = i64::from(self.0);
        let m = i64::from(m.0);
        (-j..=j).contains(&m) && (m + j) % 2 == 0
    }

    /// Projections by ascending value.
    pub fn iter(self) -> SpinProjections {
        SpinProjections { next: -(self.0 as i32), last: self.0 as i32 }
    }

    /// Projections by descending value.
    pub fn iter_rev(self) -> SpinProjectionsRev {
        SpinProjectionsRev { next: self.0 as i32, last: -(self.0 as i32) }
    }
}

impl IntoIterator for SpinTotal {
    type IntoIter = SpinProjections;
    type Item = SpinProj;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}

impl std::ops::Add for SpinTotal {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output { Self(self.0 + rhs.0) }
}

/// Iterator over spin projections for a fixed total spin magnitude.
///
/// Projections are visited in ascending order.
#[derive(Copy, Clone, Debug)]
pub struct SpinProjections {
    next: i32,
    last: i32,
}

impl Iterator for SpinProjections {
    type Item = SpinProj;

    fn next(&mut self) -> Option<Self::Item> {
        (self.next <= self.last).then(|| {
            let m = SpinProj(self.next);
            self.next += 2;
            m
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = ((self.last - self.next) / 2 + 1).max(0) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SpinProjections { }

/// Reverse iterator over spin projections for a fixed total spin magnitude.
///
/// Projections are visited in descending order.
#[derive(Copy, Clone, Debug)]
pub struct SpinProjectionsRev {
    next: i32,
    last: i32,
}

impl Iterator for SpinProjectionsRev {
    type Item = SpinProj;

    fn next(&mut self) -> Option<Self::Item> {
        (self.next >= self.last).then(|| {
            let m = SpinProj(self.next);
            self.next -= 2;
            m
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = ((self.next - self.last) / 2 + 1).max(0) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SpinProjectionsRev { }

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn projections_cover_range() {
        let j = SpinTotal::new(3);
        let up: Vec<i32> = j.iter().map(|m| m.halves()).collect();
        let dn: Vec<i32> = j.iter_rev().map(|m| m.halves()).collect();
        assert_eq!(up, vec![-3, -1, 1, 3]);
        assert_eq!(dn, vec![3, 1, -1, -3]);
        assert_eq!(j.iter().len(), j.multiplicity());
    }

    #[test]
    fn zero_spin_has_one_projection() {
        let j = SpinTotal::new(0);
        assert_eq!(j.iter().collect::<Vec<_>>(), vec![SpinProj::new(0)]);
        assert_eq!(j.iter_rev().len(), 1);
    }

    #[test]
    fn admits_checks_range_and_parity() {
        let j = SpinTotal::integer(1);
        assert!(j.admits(SpinProj::new(-2)));
        assert!(j.admits(SpinProj::new(0)));
        assert!(!j.admits(SpinProj::new(1)));
        assert!(!j.admits(SpinProj::new(4)));
        assert_eq!(format!("{}", SpinProj::new(-3)), "-3/2");
        assert_eq!(format!("{}", SpinProj::new(4)), "2");
    }
}
