//! Shared fixtures for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{ApiError, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

pub const ERROR_XML_ALREADY_EXISTS: &str = r#"<?xml version="1.0" encoding="utf-8"?><exc:exception xmlns:exc="http://www.sap.com/abapxml/types/communicationframework"><namespace id="com.sap.adt"/><type id="ExceptionResourceAlreadyExists"/><message lang="EN">Resource Package $IAMTHEKING does already exist.</message><localizedMessage lang="EN">Resource Package $IAMTHEKING does already exist.</localizedMessage><properties/></exc:exception>"#;

/// Replays canned responses in order and records every request sent.
pub struct ScriptedTransport {
    responses: VecDeque<HttpResponse>,
    sent: Rc<RefCell<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<HttpResponse>) -> (Self, Rc<RefCell<Vec<HttpRequest>>>) {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let transport = Self {
            responses: responses.into(),
            sent: Rc::clone(&sent),
        };
        (transport, sent)
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse> {
        self.sent.borrow_mut().push(request.clone());
        self.responses
            .pop_front()
            .ok_or_else(|| ApiError::Transport(format!("no response scripted for {}", request.url)))
    }
}

pub fn connection(transport: ScriptedTransport) -> Connection {
    Connection::with_transport(
        ConnectionConfig::new("localhost", "100", "DEVELOPER", "Down1oad"),
        transport,
    )
}

pub fn response(status: u16, content_type: &str, body: &str) -> HttpResponse {
    let headers = if content_type.is_empty() {
        Vec::new()
    } else {
        vec![("Content-Type".to_string(), content_type.to_string())]
    };
    HttpResponse {
        status,
        headers,
        body: body.to_string(),
    }
}

pub fn lock_response(handle: &str) -> HttpResponse {
    response(
        200,
        "application/vnd.sap.as+xml; charset=utf-8; dataname=com.sap.adt.lock.Result",
        &format!(
            r#"<?xml version="1.0" encoding="utf-8"?><asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0"><asx:values><DATA><LOCK_HANDLE>{handle}</LOCK_HANDLE></DATA></asx:values></asx:abap>"#
        ),
    )
}
