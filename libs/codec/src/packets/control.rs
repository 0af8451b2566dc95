//! Session-control packets: connection liveness, session lifecycle and
//! queue management

define_packet! {
    /// Keep-alive; the server echoes it back
    Ping = Ping {
        /// Connection TTL in milliseconds, `-1` for none
        connection_ttl: i64,
    }
}

define_packet! {
    /// Orderly connection shutdown, optionally naming the node going away
    Disconnect = Disconnect {
        node_id: Option<String>,
    }
}

define_packet! {
    /// Failure reply to a request that expected a response
    Exception = Exception {
        code: i32,
        message: Option<String>,
    }
}

define_packet! {
    /// Success reply with no payload
    NullResponse = NullResponse {}
}

define_packet! {
    PacketsConfirmed = PacketsConfirmed {
        command_id: i32,
    }
}

define_packet! {
    /// Open a session on a new channel
    CreateSession = CreateSession {
        name: String,
        session_channel_id: i64,
        version: i32,
        username: Option<String>,
        password: Option<String>,
        min_large_message_size: i32,
        xa: bool,
        auto_commit_sends: bool,
        auto_commit_acks: bool,
        pre_acknowledge: bool,
        window_size: i32,
        default_address: Option<String>,
    }
}

define_packet! {
    CreateSessionResponse = CreateSessionResponse {
        server_version: i32,
    }
}

define_packet! {
    /// Create a queue and bind it to an address (which may be a pattern)
    CreateQueue = CreateQueue {
        address: String,
        queue_name: String,
        filter: Option<String>,
        durable: bool,
        temporary: bool,
    }
}

define_packet! {
    DeleteQueue = DeleteQueue {
        queue_name: String,
    }
}

define_packet! {
    SessionCommit = SessionCommit {}
}

define_packet! {
    SessionRollback = SessionRollback {
        consider_last_message_as_delivered: bool,
    }
}

define_packet! {
    SessionStart = SessionStart {}
}

define_packet! {
    SessionStop = SessionStop {}
}

define_packet! {
    SessionClose = SessionClose {}
}
