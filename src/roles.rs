use std::{borrow::Cow, fmt};

use crate::{error::AdmissionError, models::Identity};

/// RoleClass
///
/// The user classes the Authority reports in `user_type`. Anything else the Authority
/// might send is not a member of any set and is therefore never admitted by a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleClass {
    Student,
    Teacher,
    Admin,
}

impl RoleClass {
    /// Canonical order, used for membership bits and for naming sets.
    pub const ALL: [RoleClass; 3] = [RoleClass::Student, RoleClass::Teacher, RoleClass::Admin];

    pub fn parse(user_type: &str) -> Option<Self> {
        match user_type {
            "student" => Some(RoleClass::Student),
            "teacher" => Some(RoleClass::Teacher),
            "admin" => Some(RoleClass::Admin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoleClass::Student => "student",
            RoleClass::Teacher => "teacher",
            RoleClass::Admin => "admin",
        }
    }

    /// Label used in user-facing denial messages.
    fn label(self) -> &'static str {
        match self {
            RoleClass::Student => "学生",
            RoleClass::Teacher => "教师",
            RoleClass::Admin => "管理员",
        }
    }

    const fn bit(self) -> u8 {
        match self {
            RoleClass::Student => 1,
            RoleClass::Teacher => 1 << 1,
            RoleClass::Admin => 1 << 2,
        }
    }
}

impl fmt::Display for RoleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RoleSet
///
/// An immutable set of role classes, small enough to be `Copy` and built in const
/// context so the named gates below are plain constants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const fn of(classes: &[RoleClass]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < classes.len() {
            bits |= classes[i].bit();
            i += 1;
        }
        RoleSet(bits)
    }

    pub fn contains(self, class: RoleClass) -> bool {
        self.0 & class.bit() != 0
    }

    /// Membership test on the raw `user_type` string reported by the Authority.
    pub fn admits(self, user_type: &str) -> bool {
        RoleClass::parse(user_type).is_some_and(|class| self.contains(class))
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = RoleClass> {
        RoleClass::ALL.into_iter().filter(move |class| self.contains(*class))
    }

    /// describe
    ///
    /// Names the set for denial messages: `管理员`, `学生和管理员`,
    /// `学生、教师和管理员`.
    pub fn describe(self) -> String {
        let labels: Vec<&str> = self.iter().map(RoleClass::label).collect();
        match labels.split_last() {
            None => String::new(),
            Some((last, [])) => (*last).to_string(),
            Some((last, rest)) => format!("{}和{}", rest.join("、"), last),
        }
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// AdmissionResult
///
/// Outcome of one gate evaluation. `Forbidden` is only reachable when an identity
/// was present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionResult {
    Allow,
    Unauthenticated,
    Forbidden,
}

/// RoleGate
///
/// One admission predicate, parameterized by the role classes it lets through. The
/// four gates the services use are constants; others can be built from configuration.
///
/// A gate never talks to the Authority and never reads headers. It only looks at the
/// identity the verification stage bound to the request, which is what lets the same
/// gate value be shared by every route and every request without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGate {
    /// Stable identifier reported by the admission probes and written to the logs,
    /// e.g. `student_or_admin`.
    name: Cow<'static, str>,
    /// The role classes admitted. Also the source of the denial message.
    allowed: RoleSet,
}

impl RoleGate {
    pub const ADMIN_ONLY: RoleGate = RoleGate::named("admin_only", RoleSet::of(&[RoleClass::Admin]));
    pub const STUDENT_OR_ADMIN: RoleGate = RoleGate::named(
        "student_or_admin",
        RoleSet::of(&[RoleClass::Student, RoleClass::Admin]),
    );
    pub const STUDENT_TEACHER_OR_ADMIN: RoleGate = RoleGate::named(
        "student_teacher_or_admin",
        RoleSet::of(&[RoleClass::Student, RoleClass::Teacher, RoleClass::Admin]),
    );
    pub const TEACHER_OR_ADMIN: RoleGate = RoleGate::named(
        "teacher_or_admin",
        RoleSet::of(&[RoleClass::Teacher, RoleClass::Admin]),
    );

    const fn named(name: &'static str, allowed: RoleSet) -> Self {
        RoleGate {
            name: Cow::Borrowed(name),
            allowed,
        }
    }

    pub fn new(name: impl Into<Cow<'static, str>>, allowed: RoleSet) -> Self {
        RoleGate {
            name: name.into(),
            allowed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn allowed(&self) -> RoleSet {
        self.allowed
    }

    /// evaluate
    ///
    /// Pure decision over whatever identity is in scope. The same identity always
    /// yields the same result, so the gate can be tested without a request.
    ///
    /// The decision runs in two steps:
    /// 1. Presence: `None` means the verification stage has not produced an identity
    ///    for this request. That is `Unauthenticated`, never `Forbidden`, whatever
    ///    the gate.
    /// 2. Membership: the identity's `user_type` is matched exactly against the
    ///    allowed set. Unknown or differently-cased classes are outside every set.
    pub fn evaluate(&self, identity: Option<&Identity>) -> AdmissionResult {
        match identity {
            None => AdmissionResult::Unauthenticated,
            Some(identity) if self.allowed.admits(&identity.user_type) => AdmissionResult::Allow,
            Some(_) => AdmissionResult::Forbidden,
        }
    }

    /// check
    ///
    /// `evaluate`, mapped onto the error the chain renders.
    pub fn check(&self, identity: Option<&Identity>) -> Result<(), AdmissionError> {
        match self.evaluate(identity) {
            AdmissionResult::Allow => Ok(()),
            AdmissionResult::Unauthenticated => Err(AdmissionError::NotAuthenticated),
            AdmissionResult::Forbidden => Err(AdmissionError::Forbidden {
                allowed: self.allowed,
            }),
        }
    }
}
