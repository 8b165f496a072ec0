use std::{fmt, str::FromStr};

use super::Error;

/// A local search method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Limited-memory BFGS with box bounds.
    LBfgsB,

    /// Downhill simplex search.
    NelderMead,

    /// Powell's conjugate direction-set method.
    Powell,

    /// Truncated Newton with a finite-difference Hessian.
    Tnc,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::LBfgsB,
        Method::NelderMead,
        Method::Powell,
        Method::Tnc,
    ];

    /// The method's conventional name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::LBfgsB => "L-BFGS-B",
            Self::NelderMead => "Nelder-Mead",
            Self::Powell => "Powell",
            Self::Tnc => "TNC",
        }
    }

    /// Option keys this method reads.
    ///
    /// Other keys are logged and ignored by [`minimize`](super::minimize).
    #[must_use]
    pub const fn option_keys(self) -> &'static [&'static str] {
        match self {
            Self::LBfgsB => &[
                "disp",
                "eps",
                "finite_diff_rel_step",
                "ftol",
                "gtol",
                "iprint",
                "maxcor",
                "maxfun",
                "maxiter",
                "maxls",
            ],
            Self::NelderMead => &[
                "adaptive",
                "disp",
                "fatol",
                "initial_simplex",
                "maxfev",
                "maxiter",
                "return_all",
                "xatol",
            ],
            Self::Powell => &[
                "direc",
                "disp",
                "ftol",
                "maxfev",
                "maxiter",
                "return_all",
                "xtol",
            ],
            Self::Tnc => &[
                "accuracy",
                "disp",
                "eps",
                "eta",
                "finite_diff_rel_step",
                "ftol",
                "gtol",
                "maxCGit",
                "maxfun",
                "maxiter",
                "minfev",
                "offset",
                "rescale",
                "scale",
                "stepmx",
                "xtol",
            ],
        }
    }

    /// Whether `key` is an option this method reads.
    #[must_use]
    pub fn accepts(self, key: &str) -> bool {
        self.option_keys().contains(&key)
    }

    /// Key holding this method's evaluation limit.
    #[must_use]
    pub fn budget_key(self) -> &'static str {
        match self {
            Self::LBfgsB | Self::Tnc => "maxfun",
            Self::NelderMead | Self::Powell => "maxfev",
        }
    }

    /// Whether the method evaluates gradients.
    #[must_use]
    pub fn uses_gradient(self) -> bool {
        matches!(self, Self::LBfgsB | Self::Tnc)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parses a method name, ignoring case.
impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownMethod(s.to_owned()))
    }
}
