use crate::group::{get_groups_for_user, GroupType};
use crate::user::{find_client_user, UserSummary, SESSION_USER_KEY};
use actix_session::Session;
use actix_utils::future::{ok, Ready};
use actix_web::dev::{
    forward_ready, Extensions, Payload, Service, ServiceRequest, ServiceResponse, Transform,
};
use actix_web::{web::Data, Error, FromRequest, HttpMessage, HttpRequest};
use futures_util::future::{FutureExt as _, LocalBoxFuture};
use sea_orm::DatabaseConnection;
use std::time::{Duration, Instant};
use std::{cell::RefCell, rc::Rc};

/// Client data stored for a single request cycle.
/// Distinct from ClientCtx because it is defined through request data.
#[derive(Clone, Debug)]
pub struct ClientCtxInner {
    pub client: Option<UserSummary>,
    pub groups: Vec<GroupType>,
    pub request_start: Instant,
}

impl Default for ClientCtxInner {
    fn default() -> Self {
        Self {
            client: None,
            groups: Vec::new(),
            request_start: Instant::now(),
        }
    }
}

/// Client context passed to routes.
/// Wraps ClientCtxInner, which is set at the beginning of the request.
#[derive(Clone, Debug, Default)]
pub struct ClientCtx(Rc<RefCell<ClientCtxInner>>);

impl ClientCtx {
    /// Context for an already-known user, outside of a request.
    pub fn from_user(user: UserSummary, groups: Vec<GroupType>) -> Self {
        Self(Rc::new(RefCell::new(ClientCtxInner {
            client: Some(user),
            groups,
            request_start: Instant::now(),
        })))
    }

    /// Context of a request that has passed through the middleware.
    pub fn from_http_request(req: &HttpRequest) -> Self {
        Self::get_client_ctx(&mut req.extensions_mut())
    }

    fn get_client_ctx(extensions: &mut Extensions) -> Self {
        match extensions.get::<Rc<RefCell<ClientCtxInner>>>() {
            // Existing record in extensions; pull it.
            Some(s_impl) => Self(Rc::clone(s_impl)),
            // No existing record; create and insert it.
            None => {
                let inner = Rc::new(RefCell::new(ClientCtxInner::default()));
                extensions.insert(inner.clone());
                Self(inner)
            }
        }
    }

    /// Returns either the user's id or None.
    pub fn get_id(&self) -> Option<i32> {
        self.0.borrow().client.as_ref().map(|u| u.id)
    }

    /// Discord id of the signed-in user, if linked.
    pub fn get_discord_id(&self) -> Option<i64> {
        self.0.borrow().client.as_ref().and_then(|u| u.discord_id)
    }

    /// Returns either the user's name or the word for guest.
    pub fn get_name(&self) -> String {
        match &self.0.borrow().client {
            Some(user) => user.name.to_owned(),
            None => "Guest".to_owned(),
        }
    }

    pub fn get_avatar_url(&self) -> Option<String> {
        self.0
            .borrow()
            .client
            .as_ref()
            .map(|u| u.avatar_url.to_owned())
    }

    pub fn get_profile_url(&self) -> Option<String> {
        self.0.borrow().client.as_ref().and_then(|u| u.profile_url())
    }

    pub fn get_user(&self) -> Option<UserSummary> {
        self.0.borrow().client.to_owned()
    }

    pub fn is_user(&self) -> bool {
        self.0.borrow().client.is_some()
    }

    /// Staff as of the last login. Permission checks ask the stats mirror instead.
    pub fn is_staff(&self) -> bool {
        self.0.borrow().groups.contains(&GroupType::Staff)
    }

    /// Returns Duration representing request time.
    pub fn request_time(&self) -> Duration {
        Instant::now() - self.0.borrow().request_start
    }

    /// Returns human readable representing request time.
    pub fn request_time_as_string(&self) -> String {
        let us = self.request_time().as_micros();
        if us > 5000 {
            format!("{}ms", us / 1000)
        } else {
            format!("{}μs", us)
        }
    }
}

/// This implementation is what actually provides the `client: ClientCtx` in the parameters of route functions.
impl FromRequest for ClientCtx {
    /// The associated error which can be returned.
    type Error = Error;
    /// Future that resolves to a Self.
    type Future = Ready<Result<Self, Self::Error>>;

    /// Create a Self from request parts asynchronously.
    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ok(ClientCtx::get_client_ctx(&mut req.extensions_mut()))
    }
}

impl<S, B> Transform<S, ServiceRequest> for ClientCtx
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ClientCtxMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ClientCtxMiddleware {
            service: Rc::new(service),
        })
    }
}

/// Client context middleware
pub struct ClientCtxMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ClientCtxMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Borrows of `req` must be done in a precise way to avoid conflicts. This order is important.
        let (httpreq, payload) = req.into_parts();
        let session = Session::extract(&httpreq).into_inner();
        let req = ServiceRequest::from_parts(httpreq, payload);
        let db = req.app_data::<Data<DatabaseConnection>>().cloned();
        let ctx = ClientCtx::get_client_ctx(&mut req.extensions_mut());
        let service = Rc::clone(&self.service);

        async move {
            let user_id = match session {
                Ok(session) => session.get::<i32>(SESSION_USER_KEY).unwrap_or_else(|e| {
                    log::warn!("ClientCtxMiddleware: unreadable session: {}", e);
                    None
                }),
                Err(e) => {
                    log::error!("ClientCtxMiddleware: Session::extract(): {}", e);
                    None
                }
            };

            if let (Some(user_id), Some(db)) = (user_id, db) {
                match find_client_user(&db, user_id).await {
                    Ok(client) => {
                        let groups = match client {
                            Some(_) => get_groups_for_user(&db, user_id).await,
                            None => Vec::new(),
                        };
                        let mut inner = ctx.0.borrow_mut();
                        inner.client = client;
                        inner.groups = groups;
                    }
                    Err(e) => log::error!("ClientCtxMiddleware: loading user {}: {}", user_id, e),
                }
            }

            service.call(req).await
        }
        .boxed_local()
    }
}
