use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{error, Error};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

/// Rejects requests whose Host header is not configured.
/// An entry of `*` allows any host.
#[derive(Clone, Debug)]
pub struct AllowedHosts {
    hosts: Rc<Vec<String>>,
}

impl AllowedHosts {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            hosts: Rc::new(hosts),
        }
    }
}

/// Host without any port, lowercased.
fn bare_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    if host.starts_with('[') {
        // IPv6 literal, e.g. [::1]:8080
        match host.find(']') {
            Some(end) => host[..=end].to_owned(),
            None => host,
        }
    } else {
        match host.rsplit_once(':') {
            Some((name, _port)) => name.to_owned(),
            None => host,
        }
    }
}

fn is_allowed(hosts: &[String], host: &str) -> bool {
    let host = bare_host(host);
    hosts.iter().any(|allowed| allowed == "*" || *allowed == host)
}

impl<S, B> Transform<S, ServiceRequest> for AllowedHosts
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AllowedHostsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AllowedHostsMiddleware {
            service,
            hosts: Rc::clone(&self.hosts),
        }))
    }
}

pub struct AllowedHostsMiddleware<S> {
    service: S,
    hosts: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for AllowedHostsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let host = req.connection_info().host().to_owned();
        if !is_allowed(&self.hosts, &host) {
            log::warn!("Rejected request for disallowed host {:?}.", host);
            let res = req
                .error_response(error::ErrorBadRequest("Bad Request (400)"))
                .map_into_right_body();
            return Box::pin(async { Ok(res) });
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}
