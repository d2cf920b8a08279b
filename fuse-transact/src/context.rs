//! The context of one in-flight logical filesystem operation

use crate::cache::ForgetList;
use crate::decode::FuseResponse;
use crate::encode::RequestBuilder;
use crate::instance::FuseInstance;
use crate::proto;
use crate::provider::{AccessMask, NtStatus, ProviderRequest, ProviderResponse, RequestKind};

use std::fmt::{self, Debug};
use std::mem;

/// Where the operation's state machine continues when next invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResumePoint {
    Start,
    AwaitReply,
    Done,
}

/// Opcode-specific operation state.
#[derive(Debug)]
pub(crate) enum Payload {
    /// Protocol handshake, engine-originated.
    Init,
    Lookup {
        parent: u64,
        name: Vec<u8>,
    },
    GetAttr {
        nodeid: u64,
    },
    Open {
        nodeid: u64,
        access: AccessMask,
        dir: bool,
    },
    /// Forget notifications, engine-originated, drained across calls.
    Forget {
        list: ForgetList,
    },
    /// Nothing to exchange (pre-resolved operations).
    None,
}

/// Link to the external operation this context was created to satisfy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundHandle {
    pub hint: u64,
}

pub(crate) type Finalizer = Box<dyn FnOnce(&mut Payload) + Send>;

/// Runtime state for one in-flight logical filesystem operation.
///
/// A context is a member of exactly one of {pending, processing, none}
/// at any instant and, once removed from the queue, is exclusively owned
/// by that channel exchange until re-queued, delivered or dropped.
pub struct FuseContext {
    /// Correlation token, unique among live operations.
    pub(crate) token: u64,
    pub(crate) resume: ResumePoint,
    /// `None` for engine-originated operations (handshake, forget).
    pub(crate) handle: Option<BoundHandle>,
    /// The in-progress result, present for the whole lifetime.
    pub(crate) response: ProviderResponse,
    pub(crate) payload: Payload,
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    pub(crate) pid: u32,
    pre_resolved: Option<NtStatus>,
    fini: Option<Finalizer>,
}

impl Debug for FuseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuseContext")
            .field("token", &self.token)
            .field("resume", &self.resume)
            .field("handle", &self.handle)
            .field("payload", &self.payload)
            .finish()
    }
}

impl FuseContext {
    /// Creates a context bound to a framework operation.
    ///
    /// Kinds outside the translated subset come out pre-resolved:
    /// their outcome is known without any protocol round trip.
    pub(crate) fn from_request(token: u64, request: ProviderRequest) -> Box<Self> {
        let ProviderRequest {
            hint,
            uid,
            gid,
            pid,
            kind,
        } = request;

        let (payload, pre_resolved) = match kind {
            RequestKind::Lookup { parent, name } => (Payload::Lookup { parent, name }, None),
            RequestKind::GetAttr { nodeid } => (Payload::GetAttr { nodeid }, None),
            RequestKind::Open { nodeid, access } => (
                Payload::Open {
                    nodeid,
                    access,
                    dir: false,
                },
                None,
            ),
            RequestKind::OpenDir { nodeid } => (
                Payload::Open {
                    nodeid,
                    access: AccessMask::empty(),
                    dir: true,
                },
                None,
            ),
            RequestKind::Unsupported => (Payload::None, Some(NtStatus::INVALID_DEVICE_REQUEST)),
        };

        Box::new(Self {
            token,
            resume: ResumePoint::Start,
            handle: Some(BoundHandle { hint }),
            response: ProviderResponse {
                hint,
                ..ProviderResponse::default()
            },
            payload,
            uid,
            gid,
            pid,
            pre_resolved,
            fini: None,
        })
    }

    /// Creates an engine-originated context (handshake, forget).
    pub(crate) fn internal(token: u64, payload: Payload, fini: Option<Finalizer>) -> Box<Self> {
        Box::new(Self {
            token,
            resume: ResumePoint::Start,
            handle: None,
            response: ProviderResponse::default(),
            payload,
            uid: 0,
            gid: 0,
            pid: 0,
            pre_resolved: None,
            fini,
        })
    }

    pub(crate) fn pre_resolved(&self) -> Option<NtStatus> {
        self.pre_resolved
    }

    pub(crate) fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn undrained_forget(&self) -> bool {
        matches!(&self.payload, Payload::Forget { list } if !list.is_empty())
    }

    /// Moves the bound result out for delivery.
    pub(crate) fn take_response(&mut self) -> ProviderResponse {
        mem::take(&mut self.response)
    }

    /// Builds the next outbound message for this operation.
    ///
    /// Returns `true` when the operation suspended and now awaits a
    /// reply, `false` when it finished without one.
    pub(crate) fn send(&mut self, instance: &FuseInstance, req: &mut RequestBuilder<'_>) -> bool {
        debug_assert_eq!(self.resume, ResumePoint::Start);
        match self.payload {
            Payload::Init => proto::send_init(self, req),
            Payload::Lookup { .. } => proto::send_lookup(self, req),
            Payload::GetAttr { .. } => proto::send_getattr(self, req),
            Payload::Open { .. } => proto::send_open(self, req),
            Payload::Forget { .. } => proto::fill_forget(self, instance, req),
            Payload::None => {
                debug_assert!(false, "pre-resolved context asked to send");
                false
            }
        }
    }

    /// Feeds a matching reply into the operation.
    ///
    /// Returns `true` when another request must be sent for the same
    /// logical operation, `false` when it finished.
    pub(crate) fn resume_with(&mut self, instance: &FuseInstance, rsp: &FuseResponse<'_>) -> bool {
        debug_assert_eq!(self.resume, ResumePoint::AwaitReply);
        match self.payload {
            Payload::Init => proto::resume_init(self, instance, rsp),
            Payload::Lookup { .. } => proto::resume_lookup(self, instance, rsp),
            Payload::GetAttr { .. } => proto::resume_getattr(self, instance, rsp),
            Payload::Open { .. } => proto::resume_open(self, rsp),
            Payload::Forget { .. } | Payload::None => {
                debug_assert!(false, "no reply is defined for this operation");
                false
            }
        }
    }
}

impl Drop for FuseContext {
    fn drop(&mut self) {
        if let Some(fini) = self.fini.take() {
            fini(&mut self.payload);
        }
    }
}
