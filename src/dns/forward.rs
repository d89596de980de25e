use crate::error::Error;
use crate::resolver::upstream::DynUpstream;
use tracing::debug;
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::Name;
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

/// The tail of the handler chain: every query the dispatcher declines
/// is relayed to the upstream resolver and answered with whatever it
/// returned. There is nothing left to fall through to, so an upstream
/// failure here does become a SERVFAIL.
#[derive(Clone)]
pub struct Forwarder {
    upstream: DynUpstream,
}

impl Forwarder {
    pub fn new(upstream: DynUpstream) -> Self {
        Forwarder { upstream }
    }

    async fn forward<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            let response = MessageResponseBuilder::from_message_request(request);
            return Ok(response_handle
                .send_response(response.error_msg(request.header(), ResponseCode::NotImp))
                .await?);
        }

        let query = request.query();
        let name = Name::from(query.name());
        let records = self.upstream.lookup(&name, query.query_type()).await?;

        let mut header = Header::response_from_request(request.header());
        header.set_recursion_available(true);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, records.iter(), &[], &[], &[]);
        Ok(response_handle.send_response(response).await?)
    }
}

#[async_trait::async_trait]
impl RequestHandler for Forwarder {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        match self.forward(request, response_handle.clone()).await {
            Ok(info) => info,
            Err(err) => {
                debug!(%err, "upstream forward failed");
                let builder = MessageResponseBuilder::from_message_request(request);
                let mut header = Header::response_from_request(request.header());
                header.set_response_code(ResponseCode::ServFail);
                match response_handle.send_response(builder.build_no_records(header)).await {
                    Ok(info) => info,
                    Err(_) => {
                        let mut header = Header::new();
                        header.set_response_code(ResponseCode::ServFail);
                        header.into()
                    }
                }
            }
        }
    }
}
