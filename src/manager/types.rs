use tokio::sync::oneshot;
use crate::core::{EventHandler, EventKind, FileSource, JobId, JobSnapshot, JobStatus, Result};

/// 管理器命令, 每条命令都带一个回复通道
pub enum ManagerCommand {
    /// 添加文件
    Add {
        files: Vec<FileSource>,
        reply: oneshot::Sender<Result<Vec<JobId>>>,
    },

    Start {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },

    StartAll {
        reply: oneshot::Sender<Result<()>>,
    },

    /// 取消上传
    Abort {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },

    AbortAll {
        reply: oneshot::Sender<Result<()>>,
    },

    Remove {
        id: JobId,
        reply: oneshot::Sender<Result<()>>,
    },

    /// 注册事件处理器
    Subscribe {
        kind: EventKind,
        handler: EventHandler,
        reply: oneshot::Sender<()>,
    },

    /// `None` drops every handler.
    Unsubscribe {
        kind: Option<EventKind>,
        reply: oneshot::Sender<()>,
    },

    Count {
        status: Option<JobStatus>,
        reply: oneshot::Sender<usize>,
    },

    IsBusy {
        id: Option<JobId>,
        reply: oneshot::Sender<Result<bool>>,
    },

    TotalBytes {
        id: Option<JobId>,
        reply: oneshot::Sender<Result<Option<u64>>>,
    },

    TotalTransferred {
        id: Option<JobId>,
        reply: oneshot::Sender<Result<Option<u64>>>,
    },

    Speed {
        id: Option<JobId>,
        average: bool,
        reply: oneshot::Sender<Result<Option<u64>>>,
    },

    TimeRemaining {
        id: Option<JobId>,
        average: bool,
        reply: oneshot::Sender<Result<Option<u64>>>,
    },

    GetJob {
        id: JobId,
        reply: oneshot::Sender<Option<JobSnapshot>>,
    },

    GetAllJobs {
        reply: oneshot::Sender<Vec<JobSnapshot>>,
    },

    /// 销毁上传器, 之后的操作返回 `Destroyed`
    Destroy {
        reply: oneshot::Sender<()>,
    },
}
