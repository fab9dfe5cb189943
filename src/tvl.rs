//! Three-valued logic for classifications that may be unknown.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tvl {
    Yes,
    No,
    Maybe,
}

impl Default for Tvl {
    fn default() -> Self {
        Tvl::Maybe
    }
}

impl Tvl {
    pub fn is_true(self) -> bool {
        self == Tvl::Yes
    }

    pub fn is_false(self) -> bool {
        self == Tvl::No
    }

    pub fn is_maybe(self) -> bool {
        self == Tvl::Maybe
    }

    /// Least upper bound: agreeing values stay, anything else is
    /// `Maybe`.
    pub fn join(self, other: Tvl) -> Tvl {
        if self == other {
            self
        } else {
            Tvl::Maybe
        }
    }
}

impl From<bool> for Tvl {
    fn from(b: bool) -> Tvl {
        if b {
            Tvl::Yes
        } else {
            Tvl::No
        }
    }
}

impl fmt::Display for Tvl {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Tvl::Yes => "yes",
            Tvl::No => "no",
            Tvl::Maybe => "maybe",
        };
        f.write_str(s)
    }
}
