use serenity::http::HttpError;

/// Check whether a Discord API error is a 404 (unknown channel/message/member)
pub fn is_not_found(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 404
    )
}
