use crate::error::Error;
use crate::metrics::HandlerMetrics;
use crate::resolver::AaResolver;
use std::time::Instant;
use tracing::{debug, error};
use trust_dns_server::authority::MessageResponseBuilder;
use trust_dns_server::client::op::{Header, MessageType, OpCode, ResponseCode};
use trust_dns_server::client::rr::{DNSClass, LowerName, RecordType};
use trust_dns_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

/// The query dispatcher.
///
/// A/AAAA queries for names under `from` (and not under `except`) are
/// answered through the AA resolver. Everything else, and every query
/// the resolver cannot answer, is handed to the next handler in the
/// chain; a miss never synthesizes a failure of its own, because the
/// chain may have other sources for the name.
pub struct Handler<N> {
    from: Vec<LowerName>,
    except: Vec<LowerName>,
    resolver: AaResolver,
    metrics: HandlerMetrics,
    next: N,
}

impl<N: RequestHandler> Handler<N> {
    pub fn new(
        from: Vec<LowerName>,
        except: Vec<LowerName>,
        resolver: AaResolver,
        metrics: HandlerMetrics,
        next: N,
    ) -> Self {
        Handler {
            from,
            except,
            resolver,
            metrics,
            next,
        }
    }

    /// True iff `name` falls under one of the `from` suffixes and under
    /// none of the `except` suffixes.
    pub fn matches(&self, name: &LowerName) -> bool {
        self.from.iter().any(|zone| zone.zone_of(name))
            && !self.except.iter().any(|zone| zone.zone_of(name))
    }

    async fn dispatch_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> Result<ResponseInfo, Error> {
        if request.op_code() != OpCode::Query || request.message_type() != MessageType::Query {
            return Ok(self.next.handle_request(request, response_handle).await);
        }

        let query = request.query();
        if !self.matches(query.name())
            || query.query_class() != DNSClass::IN
            || !matches!(query.query_type(), RecordType::A | RecordType::AAAA)
        {
            return Ok(self.next.handle_request(request, response_handle).await);
        }

        let started = Instant::now();
        let answers = match self.resolver.resolve_aa(query).await {
            Ok(answers) => answers,
            Err(err) => {
                debug!(name = %query.name(), %err, "no AA translation, falling through");
                return Ok(self.next.handle_request(request, response_handle).await);
            }
        };

        let mut header = Header::response_from_request(request.header());
        header.set_recursion_available(true);
        header.set_response_code(ResponseCode::NoError);
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, answers.iter(), &[], &[], &[]);
        let info = response_handle.send_response(response).await?;

        self.metrics.observe(started.elapsed(), ResponseCode::NoError);
        Ok(info)
    }
}

#[async_trait::async_trait]
impl<N: RequestHandler> RequestHandler for Handler<N> {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        response_handle: R,
    ) -> ResponseInfo {
        match self.dispatch_request(request, response_handle).await {
            Ok(info) => info,
            Err(err) => {
                error!("error in RequestHandler: {err:?}");
                let mut header = Header::new();
                header.set_response_code(ResponseCode::ServFail);
                header.into()
            }
        }
    }
}
