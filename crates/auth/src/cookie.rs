/// Attributes of the cookie that carries the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: &'static str,
    pub path: &'static str,
    pub max_age_secs: u64,
    pub secure: bool,
    pub http_only: bool,
}

pub const SESSION_COOKIE: SessionCookie = SessionCookie {
    name: "token",
    path: "/",
    max_age_secs: 900,
    secure: true,
    http_only: true,
};

impl SessionCookie {
    /// `Set-Cookie` value delivering `token`.
    pub fn set_cookie(&self, token: &str) -> String {
        self.render(token, self.max_age_secs)
    }

    /// `Set-Cookie` value that makes the client drop the session.
    pub fn clear_cookie(&self) -> String {
        self.render("", 0)
    }

    /// Find this cookie's value in a `Cookie` request header.
    ///
    /// Empty values count as absent.
    pub fn extract<'a>(&self, cookie_header: &'a str) -> Option<&'a str> {
        cookie_header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value.trim().trim_matches('"'))
            .filter(|value| !value.is_empty())
    }

    fn render(&self, value: &str, max_age: u64) -> String {
        let mut out = format!("{}={}; Path={}; Max-Age={}", self.name, value, self.path, max_age);
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_session_attributes() {
        assert_eq!(
            SESSION_COOKIE.set_cookie("abc"),
            "token=abc; Path=/; Max-Age=900; Secure; HttpOnly"
        );
        assert_eq!(
            SESSION_COOKIE.clear_cookie(),
            "token=; Path=/; Max-Age=0; Secure; HttpOnly"
        );
    }

    #[test]
    fn extracts_by_exact_name() {
        assert_eq!(SESSION_COOKIE.extract("theme=dark; token=abc.def"), Some("abc.def"));
        assert_eq!(SESSION_COOKIE.extract("xtoken=abc"), None);
        assert_eq!(SESSION_COOKIE.extract("token="), None);
        assert_eq!(SESSION_COOKIE.extract(""), None);
    }
}
