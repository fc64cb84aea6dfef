use crate::store::StoreError;
use crate::subscriptions::ServiceError;
use crate::validation::ValidationError;

const FALLBACK_MESSAGE: &str = "Внутренняя ошибка сервиса. Пожалуйста, повторите запрос позже.";

/// Maps one class of service errors to a user-facing message. Returns `None`
/// to let the next handler look at the error.
pub type PresentHandler = fn(&ServiceError) -> Option<&'static str>;

/// Turns internal errors into replies fit for the chat. Handlers are tried in
/// registration order; anything unclaimed gets the generic fallback and a log
/// entry with the full detail.
pub struct ErrorPresenter {
    handlers: Vec<PresentHandler>,
}

impl ErrorPresenter {
    pub fn new(handlers: Vec<PresentHandler>) -> Self {
        Self { handlers }
    }

    /// Presenter with the full built-in handler set.
    pub fn standard() -> Self {
        Self::new(vec![validation_handler, storage_handler, lifecycle_handler])
    }

    pub fn present(&self, error: &ServiceError) -> String {
        for handler in &self.handlers {
            if let Some(message) = handler(error) {
                return message.to_string();
            }
        }
        tracing::error!(
            target: "presenter",
            error = %error,
            detail = ?error,
            "no handler matched a service error"
        );
        FALLBACK_MESSAGE.to_string()
    }
}

fn validation_handler(error: &ServiceError) -> Option<&'static str> {
    let ServiceError::Validation(validation) = error else {
        return None;
    };
    match validation {
        ValidationError::ArgCount => {
            Some("В бот нужно передать 2 опции: канал и время отправки сообщения.")
        }
        ValidationError::TimeFormat => {
            Some("Время отправки сообщения принимается в формате ЧЧ:ММ.")
        }
        ValidationError::TimeValue => Some("Некорректное время отправки сообщения."),
        ValidationError::UsernameTooShort => {
            Some("Слишком короткий юзернейм для канала. Проверьте его и отправьте запрос заново.")
        }
        ValidationError::InvalidCharacters => {
            Some("Юзернейм содержит некорректные символы. Проверьте его и отправьте запрос заново.")
        }
        ValidationError::ChannelNotFound(_) => {
            Some("Не удалось найти канал с заданным юзернеймом. Проверьте его и повторите запрос.")
        }
        ValidationError::External(_) => None,
    }
}

fn storage_handler(error: &ServiceError) -> Option<&'static str> {
    match error {
        ServiceError::Store(StoreError::Duplicate) => {
            Some("Вы уже получаете уведомления о новостях из этого канала в данное время.")
        }
        _ => None,
    }
}

fn lifecycle_handler(error: &ServiceError) -> Option<&'static str> {
    match error {
        ServiceError::UnknownSubscription => {
            Some("Подписка с такими параметрами не найдена. Проверьте список командой /subscriptions.")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::ResolveError;

    fn present(error: ServiceError) -> String {
        ErrorPresenter::standard().present(&error)
    }

    #[test]
    fn maps_every_validation_error_to_its_message() {
        let cases = [
            (
                ValidationError::ArgCount,
                "В бот нужно передать 2 опции: канал и время отправки сообщения.",
            ),
            (
                ValidationError::TimeFormat,
                "Время отправки сообщения принимается в формате ЧЧ:ММ.",
            ),
            (
                ValidationError::TimeValue,
                "Некорректное время отправки сообщения.",
            ),
            (
                ValidationError::UsernameTooShort,
                "Слишком короткий юзернейм для канала. Проверьте его и отправьте запрос заново.",
            ),
            (
                ValidationError::InvalidCharacters,
                "Юзернейм содержит некорректные символы. Проверьте его и отправьте запрос заново.",
            ),
            (
                ValidationError::ChannelNotFound("rustnews".into()),
                "Не удалось найти канал с заданным юзернеймом. Проверьте его и повторите запрос.",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(present(ServiceError::Validation(error)), expected);
        }
    }

    #[test]
    fn duplicate_subscription_has_its_own_message() {
        assert_eq!(
            present(ServiceError::Store(StoreError::Duplicate)),
            "Вы уже получаете уведомления о новостях из этого канала в данное время."
        );
    }

    #[test]
    fn unknown_subscription_has_its_own_message() {
        assert_eq!(
            present(ServiceError::UnknownSubscription),
            "Подписка с такими параметрами не найдена. Проверьте список командой /subscriptions."
        );
    }

    #[test]
    fn unclassified_errors_fall_back_to_generic_text() {
        let external = ServiceError::Validation(ValidationError::External(
            ResolveError::NotFound("rustnews".into()),
        ));
        assert_eq!(present(external), FALLBACK_MESSAGE);

        let io = ServiceError::Store(StoreError::Io(std::io::Error::other("disk gone")));
        assert_eq!(present(io), FALLBACK_MESSAGE);
    }

    #[test]
    fn handlers_run_in_registration_order() {
        fn eager(_: &ServiceError) -> Option<&'static str> {
            Some("первый")
        }
        fn shadowed(_: &ServiceError) -> Option<&'static str> {
            Some("второй")
        }

        let presenter = ErrorPresenter::new(vec![eager, shadowed]);
        assert_eq!(presenter.present(&ServiceError::UnknownSubscription), "первый");
    }
}
