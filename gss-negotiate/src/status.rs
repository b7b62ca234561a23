//! GSS-API status words (RFC 2744 §3.9.1) and the closed set of codes a
//! negotiation reports.
//!
//! A major status word packs three fields: the calling error in the top
//! byte, the routine error in the next byte, and supplementary information
//! bits in the low 16 bits. [`GssStatusCode`] flattens that into the single
//! value callers inspect after every token generation attempt.
use std::fmt;

pub const GSS_C_CALLING_ERROR_OFFSET: u32 = 24;
pub const GSS_C_ROUTINE_ERROR_OFFSET: u32 = 16;
pub const GSS_C_SUPPLEMENTARY_OFFSET: u32 = 0;

const GSS_C_CALLING_ERROR_MASK: u32 = 0o377;
const GSS_C_ROUTINE_ERROR_MASK: u32 = 0o377;
const GSS_C_SUPPLEMENTARY_MASK: u32 = 0o177777;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SupplementaryFlags: u32 {
        const GSS_S_CONTINUE_NEEDED = 1 << 0;
        const GSS_S_DUPLICATE_TOKEN = 1 << 1;
        const GSS_S_OLD_TOKEN = 1 << 2;
        const GSS_S_UNSEQ_TOKEN = 1 << 3;
        const GSS_S_GAP_TOKEN = 1 << 4;
    }
}

/// A raw major status word as returned by a GSS-API routine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MajorStatus(pub u32);

impl MajorStatus {
    pub const COMPLETE: MajorStatus = MajorStatus(0);

    pub const CALL_INACCESSIBLE_READ: MajorStatus = MajorStatus::calling(1);
    pub const CALL_INACCESSIBLE_WRITE: MajorStatus = MajorStatus::calling(2);
    pub const CALL_BAD_STRUCTURE: MajorStatus = MajorStatus::calling(3);

    pub const BAD_MECH: MajorStatus = MajorStatus::routine(1);
    pub const BAD_NAME: MajorStatus = MajorStatus::routine(2);
    pub const BAD_NAMETYPE: MajorStatus = MajorStatus::routine(3);
    pub const BAD_BINDINGS: MajorStatus = MajorStatus::routine(4);
    pub const BAD_STATUS: MajorStatus = MajorStatus::routine(5);
    pub const BAD_SIG: MajorStatus = MajorStatus::routine(6);
    pub const BAD_MIC: MajorStatus = MajorStatus::BAD_SIG;
    pub const NO_CRED: MajorStatus = MajorStatus::routine(7);
    pub const NO_CONTEXT: MajorStatus = MajorStatus::routine(8);
    pub const DEFECTIVE_TOKEN: MajorStatus = MajorStatus::routine(9);
    pub const DEFECTIVE_CREDENTIAL: MajorStatus = MajorStatus::routine(10);
    pub const CREDENTIALS_EXPIRED: MajorStatus = MajorStatus::routine(11);
    pub const CONTEXT_EXPIRED: MajorStatus = MajorStatus::routine(12);
    pub const FAILURE: MajorStatus = MajorStatus::routine(13);
    pub const BAD_QOP: MajorStatus = MajorStatus::routine(14);
    pub const UNAUTHORIZED: MajorStatus = MajorStatus::routine(15);
    pub const UNAVAILABLE: MajorStatus = MajorStatus::routine(16);
    pub const DUPLICATE_ELEMENT: MajorStatus = MajorStatus::routine(17);
    pub const NAME_NOT_MN: MajorStatus = MajorStatus::routine(18);

    pub const CONTINUE_NEEDED: MajorStatus =
        MajorStatus(SupplementaryFlags::GSS_S_CONTINUE_NEEDED.bits());
    pub const DUPLICATE_TOKEN: MajorStatus =
        MajorStatus(SupplementaryFlags::GSS_S_DUPLICATE_TOKEN.bits());
    pub const OLD_TOKEN: MajorStatus = MajorStatus(SupplementaryFlags::GSS_S_OLD_TOKEN.bits());
    pub const UNSEQ_TOKEN: MajorStatus = MajorStatus(SupplementaryFlags::GSS_S_UNSEQ_TOKEN.bits());
    pub const GAP_TOKEN: MajorStatus = MajorStatus(SupplementaryFlags::GSS_S_GAP_TOKEN.bits());

    const fn calling(code: u32) -> MajorStatus {
        MajorStatus(code << GSS_C_CALLING_ERROR_OFFSET)
    }

    const fn routine(code: u32) -> MajorStatus {
        MajorStatus(code << GSS_C_ROUTINE_ERROR_OFFSET)
    }

    pub fn calling_error(self) -> u32 {
        (self.0 >> GSS_C_CALLING_ERROR_OFFSET) & GSS_C_CALLING_ERROR_MASK
    }

    pub fn routine_error(self) -> u32 {
        (self.0 >> GSS_C_ROUTINE_ERROR_OFFSET) & GSS_C_ROUTINE_ERROR_MASK
    }

    pub fn supplementary(self) -> SupplementaryFlags {
        SupplementaryFlags::from_bits_truncate(
            (self.0 >> GSS_C_SUPPLEMENTARY_OFFSET) & GSS_C_SUPPLEMENTARY_MASK,
        )
    }

    /// True when either the calling or the routine error field is set.
    pub fn is_error(self) -> bool {
        self.calling_error() != 0 || self.routine_error() != 0
    }

    pub fn is_continue_needed(self) -> bool {
        !self.is_error() && self.supplementary().contains(SupplementaryFlags::GSS_S_CONTINUE_NEEDED)
    }

    pub const fn with(self, flags: SupplementaryFlags) -> MajorStatus {
        MajorStatus(self.0 | flags.bits())
    }
}

impl From<u32> for MajorStatus {
    fn from(raw: u32) -> Self {
        MajorStatus(raw)
    }
}

/// Status of the last token generation attempt.
///
/// This is a closed set mirroring RFC 2743. `Unknown` is the value before
/// any attempt has been made.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GssStatusCode {
    Complete,

    CallInaccessibleRead,
    CallInaccessibleWrite,
    CallBadStructure,

    BadMech,
    BadName,
    BadNametype,
    BadBindings,
    BadStatus,
    BadSig,
    BadMic,
    NoCred,
    NoContext,
    DefectiveToken,
    DefectiveCredential,
    CredentialsExpired,
    ContextExpired,
    Failure,
    BadQop,
    Unauthorized,
    Unavailable,
    DuplicateElement,
    NameNotMn,

    ContinueNeeded,
    DuplicateToken,
    OldToken,
    UnseqToken,
    GapToken,

    #[default]
    Unknown,
}

/// Coarse grouping of status codes by how a caller should react.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Complete,
    /// More server challenges are expected.
    Continue,
    /// The call itself was malformed.
    Calling,
    /// Credential, name or mechanism problems.
    Routine,
    /// Replay or ordering violations, or an unparsable token.
    Token,
    Unknown,
}

impl GssStatusCode {
    pub const ALL: [GssStatusCode; 29] = [
        GssStatusCode::Complete,
        GssStatusCode::CallInaccessibleRead,
        GssStatusCode::CallInaccessibleWrite,
        GssStatusCode::CallBadStructure,
        GssStatusCode::BadMech,
        GssStatusCode::BadName,
        GssStatusCode::BadNametype,
        GssStatusCode::BadBindings,
        GssStatusCode::BadStatus,
        GssStatusCode::BadSig,
        GssStatusCode::BadMic,
        GssStatusCode::NoCred,
        GssStatusCode::NoContext,
        GssStatusCode::DefectiveToken,
        GssStatusCode::DefectiveCredential,
        GssStatusCode::CredentialsExpired,
        GssStatusCode::ContextExpired,
        GssStatusCode::Failure,
        GssStatusCode::BadQop,
        GssStatusCode::Unauthorized,
        GssStatusCode::Unavailable,
        GssStatusCode::DuplicateElement,
        GssStatusCode::NameNotMn,
        GssStatusCode::ContinueNeeded,
        GssStatusCode::DuplicateToken,
        GssStatusCode::OldToken,
        GssStatusCode::UnseqToken,
        GssStatusCode::GapToken,
        GssStatusCode::Unknown,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GssStatusCode::Complete => "GSS_S_COMPLETE",
            GssStatusCode::CallInaccessibleRead => "GSS_S_CALL_INACCESSIBLE_READ",
            GssStatusCode::CallInaccessibleWrite => "GSS_S_CALL_INACCESSIBLE_WRITE",
            GssStatusCode::CallBadStructure => "GSS_S_CALL_BAD_STRUCTURE",
            GssStatusCode::BadMech => "GSS_S_BAD_MECH",
            GssStatusCode::BadName => "GSS_S_BAD_NAME",
            GssStatusCode::BadNametype => "GSS_S_BAD_NAMETYPE",
            GssStatusCode::BadBindings => "GSS_S_BAD_BINDINGS",
            GssStatusCode::BadStatus => "GSS_S_BAD_STATUS",
            GssStatusCode::BadSig => "GSS_S_BAD_SIG",
            GssStatusCode::BadMic => "GSS_S_BAD_MIC",
            GssStatusCode::NoCred => "GSS_S_NO_CRED",
            GssStatusCode::NoContext => "GSS_S_NO_CONTEXT",
            GssStatusCode::DefectiveToken => "GSS_S_DEFECTIVE_TOKEN",
            GssStatusCode::DefectiveCredential => "GSS_S_DEFECTIVE_CREDENTIAL",
            GssStatusCode::CredentialsExpired => "GSS_S_CREDENTIALS_EXPIRED",
            GssStatusCode::ContextExpired => "GSS_S_CONTEXT_EXPIRED",
            GssStatusCode::Failure => "GSS_S_FAILURE",
            GssStatusCode::BadQop => "GSS_S_BAD_QOP",
            GssStatusCode::Unauthorized => "GSS_S_UNAUTHORIZED",
            GssStatusCode::Unavailable => "GSS_S_UNAVAILABLE",
            GssStatusCode::DuplicateElement => "GSS_S_DUPLICATE_ELEMENT",
            GssStatusCode::NameNotMn => "GSS_S_NAME_NOT_MN",
            GssStatusCode::ContinueNeeded => "GSS_S_CONTINUE_NEEDED",
            GssStatusCode::DuplicateToken => "GSS_S_DUPLICATE_TOKEN",
            GssStatusCode::OldToken => "GSS_S_OLD_TOKEN",
            GssStatusCode::UnseqToken => "GSS_S_UNSEQ_TOKEN",
            GssStatusCode::GapToken => "GSS_S_GAP_TOKEN",
            GssStatusCode::Unknown => "STATUS_UNKNOWN",
        }
    }

    pub fn is_calling_error(self) -> bool {
        matches!(
            self,
            GssStatusCode::CallInaccessibleRead
                | GssStatusCode::CallInaccessibleWrite
                | GssStatusCode::CallBadStructure
        )
    }

    pub fn is_supplementary(self) -> bool {
        matches!(
            self,
            GssStatusCode::ContinueNeeded
                | GssStatusCode::DuplicateToken
                | GssStatusCode::OldToken
                | GssStatusCode::UnseqToken
                | GssStatusCode::GapToken
        )
    }

    pub fn is_routine_error(self) -> bool {
        !self.is_calling_error()
            && !self.is_supplementary()
            && !matches!(self, GssStatusCode::Complete | GssStatusCode::Unknown)
    }

    /// Anything other than `Complete`, `ContinueNeeded` and `Unknown`
    /// means no usable token was produced.
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            GssStatusCode::Complete | GssStatusCode::ContinueNeeded | GssStatusCode::Unknown
        )
    }

    /// Credential problems that caching a fresh ticket and retrying may fix.
    pub fn suggests_ticket_refresh(self) -> bool {
        matches!(
            self,
            GssStatusCode::NoCred
                | GssStatusCode::CredentialsExpired
                | GssStatusCode::DefectiveCredential
        )
    }

    pub fn category(self) -> StatusCategory {
        match self {
            GssStatusCode::Complete => StatusCategory::Complete,
            GssStatusCode::ContinueNeeded => StatusCategory::Continue,
            GssStatusCode::Unknown => StatusCategory::Unknown,
            GssStatusCode::DefectiveToken
            | GssStatusCode::DuplicateToken
            | GssStatusCode::OldToken
            | GssStatusCode::UnseqToken
            | GssStatusCode::GapToken => StatusCategory::Token,
            s if s.is_calling_error() => StatusCategory::Calling,
            _ => StatusCategory::Routine,
        }
    }

    /// The raw major status word for this code. `Unknown` has none.
    pub fn to_major(self) -> Option<MajorStatus> {
        let major = match self {
            GssStatusCode::Complete => MajorStatus::COMPLETE,
            GssStatusCode::CallInaccessibleRead => MajorStatus::CALL_INACCESSIBLE_READ,
            GssStatusCode::CallInaccessibleWrite => MajorStatus::CALL_INACCESSIBLE_WRITE,
            GssStatusCode::CallBadStructure => MajorStatus::CALL_BAD_STRUCTURE,
            GssStatusCode::BadMech => MajorStatus::BAD_MECH,
            GssStatusCode::BadName => MajorStatus::BAD_NAME,
            GssStatusCode::BadNametype => MajorStatus::BAD_NAMETYPE,
            GssStatusCode::BadBindings => MajorStatus::BAD_BINDINGS,
            GssStatusCode::BadStatus => MajorStatus::BAD_STATUS,
            GssStatusCode::BadSig => MajorStatus::BAD_SIG,
            GssStatusCode::BadMic => MajorStatus::BAD_MIC,
            GssStatusCode::NoCred => MajorStatus::NO_CRED,
            GssStatusCode::NoContext => MajorStatus::NO_CONTEXT,
            GssStatusCode::DefectiveToken => MajorStatus::DEFECTIVE_TOKEN,
            GssStatusCode::DefectiveCredential => MajorStatus::DEFECTIVE_CREDENTIAL,
            GssStatusCode::CredentialsExpired => MajorStatus::CREDENTIALS_EXPIRED,
            GssStatusCode::ContextExpired => MajorStatus::CONTEXT_EXPIRED,
            GssStatusCode::Failure => MajorStatus::FAILURE,
            GssStatusCode::BadQop => MajorStatus::BAD_QOP,
            GssStatusCode::Unauthorized => MajorStatus::UNAUTHORIZED,
            GssStatusCode::Unavailable => MajorStatus::UNAVAILABLE,
            GssStatusCode::DuplicateElement => MajorStatus::DUPLICATE_ELEMENT,
            GssStatusCode::NameNotMn => MajorStatus::NAME_NOT_MN,
            GssStatusCode::ContinueNeeded => MajorStatus::CONTINUE_NEEDED,
            GssStatusCode::DuplicateToken => MajorStatus::DUPLICATE_TOKEN,
            GssStatusCode::OldToken => MajorStatus::OLD_TOKEN,
            GssStatusCode::UnseqToken => MajorStatus::UNSEQ_TOKEN,
            GssStatusCode::GapToken => MajorStatus::GAP_TOKEN,
            GssStatusCode::Unknown => return None,
        };
        Some(major)
    }
}

impl From<MajorStatus> for GssStatusCode {
    fn from(major: MajorStatus) -> Self {
        match major.calling_error() {
            0 => (),
            1 => return GssStatusCode::CallInaccessibleRead,
            2 => return GssStatusCode::CallInaccessibleWrite,
            3 => return GssStatusCode::CallBadStructure,
            _ => return GssStatusCode::Failure,
        }
        let routine = match major.routine_error() {
            0 => None,
            1 => Some(GssStatusCode::BadMech),
            2 => Some(GssStatusCode::BadName),
            3 => Some(GssStatusCode::BadNametype),
            4 => Some(GssStatusCode::BadBindings),
            5 => Some(GssStatusCode::BadStatus),
            // GSS_S_BAD_SIG is the version 1 alias of the same value
            6 => Some(GssStatusCode::BadMic),
            7 => Some(GssStatusCode::NoCred),
            8 => Some(GssStatusCode::NoContext),
            9 => Some(GssStatusCode::DefectiveToken),
            10 => Some(GssStatusCode::DefectiveCredential),
            11 => Some(GssStatusCode::CredentialsExpired),
            12 => Some(GssStatusCode::ContextExpired),
            13 => Some(GssStatusCode::Failure),
            14 => Some(GssStatusCode::BadQop),
            15 => Some(GssStatusCode::Unauthorized),
            16 => Some(GssStatusCode::Unavailable),
            17 => Some(GssStatusCode::DuplicateElement),
            18 => Some(GssStatusCode::NameNotMn),
            _ => Some(GssStatusCode::Failure),
        };
        if let Some(code) = routine {
            return code;
        }
        let supplementary = major.supplementary();
        [
            (SupplementaryFlags::GSS_S_CONTINUE_NEEDED, GssStatusCode::ContinueNeeded),
            (SupplementaryFlags::GSS_S_DUPLICATE_TOKEN, GssStatusCode::DuplicateToken),
            (SupplementaryFlags::GSS_S_OLD_TOKEN, GssStatusCode::OldToken),
            (SupplementaryFlags::GSS_S_UNSEQ_TOKEN, GssStatusCode::UnseqToken),
            (SupplementaryFlags::GSS_S_GAP_TOKEN, GssStatusCode::GapToken),
        ]
        .into_iter()
        .find(|(flag, _)| supplementary.contains(*flag))
        .map_or(GssStatusCode::Complete, |(_, code)| code)
    }
}

impl fmt::Display for GssStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle of one negotiation, derived from its last status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    Uninitialized,
    InProgress,
    Complete,
    Failed,
}

impl NegotiationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, NegotiationState::Complete | NegotiationState::Failed)
    }
}

impl From<GssStatusCode> for NegotiationState {
    fn from(status: GssStatusCode) -> Self {
        match status {
            GssStatusCode::Unknown => NegotiationState::Uninitialized,
            GssStatusCode::ContinueNeeded => NegotiationState::InProgress,
            GssStatusCode::Complete => NegotiationState::Complete,
            _ => NegotiationState::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(MajorStatus::COMPLETE, GssStatusCode::Complete)]
    #[case(MajorStatus::CONTINUE_NEEDED, GssStatusCode::ContinueNeeded)]
    #[case(MajorStatus::CALL_BAD_STRUCTURE, GssStatusCode::CallBadStructure)]
    #[case(MajorStatus::NO_CRED, GssStatusCode::NoCred)]
    #[case(MajorStatus::BAD_SIG, GssStatusCode::BadMic)]
    #[case(MajorStatus::NAME_NOT_MN, GssStatusCode::NameNotMn)]
    #[case(MajorStatus::GAP_TOKEN, GssStatusCode::GapToken)]
    #[case(MajorStatus(19 << GSS_C_ROUTINE_ERROR_OFFSET), GssStatusCode::Failure)]
    #[case(MajorStatus(4 << GSS_C_CALLING_ERROR_OFFSET), GssStatusCode::Failure)]
    fn raw_words_map_to_codes(#[case] major: MajorStatus, #[case] expected: GssStatusCode) {
        assert_eq!(GssStatusCode::from(major), expected);
    }

    #[test]
    fn calling_error_takes_precedence() {
        let major = MajorStatus(
            MajorStatus::CALL_INACCESSIBLE_WRITE.0 | MajorStatus::DEFECTIVE_TOKEN.0,
        )
        .with(SupplementaryFlags::GSS_S_CONTINUE_NEEDED);
        assert_eq!(GssStatusCode::from(major), GssStatusCode::CallInaccessibleWrite);
    }

    #[test]
    fn routine_error_beats_supplementary_bits() {
        let major = MajorStatus::DEFECTIVE_TOKEN.with(SupplementaryFlags::GSS_S_CONTINUE_NEEDED);
        assert!(major.is_error());
        assert!(!major.is_continue_needed());
        assert_eq!(GssStatusCode::from(major), GssStatusCode::DefectiveToken);
    }

    #[test]
    fn every_code_but_unknown_and_bad_sig_round_trips() {
        for code in GssStatusCode::ALL {
            match (code, code.to_major()) {
                (GssStatusCode::Unknown, major) => assert_eq!(major, None),
                (GssStatusCode::BadSig, Some(major)) => {
                    assert_eq!(GssStatusCode::from(major), GssStatusCode::BadMic)
                }
                (code, Some(major)) => assert_eq!(GssStatusCode::from(major), code),
                (code, None) => panic!("{code} has no major status"),
            }
        }
    }

    #[test]
    fn categories_follow_taxonomy() {
        assert_eq!(GssStatusCode::CallInaccessibleRead.category(), StatusCategory::Calling);
        assert_eq!(GssStatusCode::NoCred.category(), StatusCategory::Routine);
        assert_eq!(GssStatusCode::DefectiveToken.category(), StatusCategory::Token);
        assert_eq!(GssStatusCode::OldToken.category(), StatusCategory::Token);
        assert_eq!(GssStatusCode::ContinueNeeded.category(), StatusCategory::Continue);
        assert!(!GssStatusCode::ContinueNeeded.is_error());
        assert!(!GssStatusCode::Unknown.is_error());
        assert!(GssStatusCode::DuplicateToken.is_error());
        assert!(GssStatusCode::NoCred.suggests_ticket_refresh());
        assert!(!GssStatusCode::BadMech.suggests_ticket_refresh());
    }

    #[rstest]
    #[case(GssStatusCode::Unknown, NegotiationState::Uninitialized)]
    #[case(GssStatusCode::ContinueNeeded, NegotiationState::InProgress)]
    #[case(GssStatusCode::Complete, NegotiationState::Complete)]
    #[case(GssStatusCode::NoCred, NegotiationState::Failed)]
    #[case(GssStatusCode::DuplicateToken, NegotiationState::Failed)]
    fn state_is_derived_from_status(#[case] status: GssStatusCode, #[case] state: NegotiationState) {
        assert_eq!(NegotiationState::from(status), state);
    }

    #[test]
    fn display_uses_rfc_names() {
        assert_eq!(GssStatusCode::CredentialsExpired.to_string(), "GSS_S_CREDENTIALS_EXPIRED");
        assert_eq!(GssStatusCode::Unknown.to_string(), "STATUS_UNKNOWN");
    }
}
