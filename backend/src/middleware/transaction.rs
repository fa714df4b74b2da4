use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    transaction::{LogFields, RequestContext, TransactionWrapper, TransactionalConnection},
};

/// Runs the rest of the stack inside a request transaction.
///
/// Handlers read the transaction through `Extension<RequestContext<C::Transaction>>`.
/// A 4xx/5xx response from the inner stack rolls the transaction back and is
/// returned as the handler rendered it.
pub async fn transaction<C>(
    State(wrapper): State<TransactionWrapper<C>>,
    request: Request,
    next: Next,
) -> Response
where
    C: TransactionalConnection + Clone,
{
    let log_fields = request
        .extensions()
        .get::<LogFields>()
        .cloned()
        .unwrap_or_default();
    let ctx = RequestContext::new(log_fields);

    let mut rendered: Option<Response> = None;
    let failed = &mut rendered;
    let result = wrapper
        .scope(&ctx, move |ctx| async move {
            let mut request = request;
            request.extensions_mut().insert(ctx);
            let response = next.run(request).await;
            let status = response.status();
            if status.is_client_error() || status.is_server_error() {
                *failed = Some(response);
                return Err(AppError::Status(
                    status,
                    "handler responded with an error status".to_string(),
                ));
            }
            Ok(response)
        })
        .await;

    match result {
        Ok(response) => response,
        Err(err @ AppError::Status(..)) => rendered.take().unwrap_or_else(|| err.into_response()),
        Err(err) => err.into_response(),
    }
}
