use super::{
    fill, render_globals, HookParams, ShellFormatter, COMPLETION_WORDS, EVAL_COMMANDS, SCRIPT_MARK,
};
use crate::types::ShellKind;

/// bash and zsh share assignment syntax; only the hook wiring differs.
#[derive(Debug, Clone, Copy)]
pub struct PosixFormatter {
    kind: ShellKind,
}

impl PosixFormatter {
    pub fn new(kind: ShellKind) -> Self {
        PosixFormatter { kind }
    }
}

impl ShellFormatter for PosixFormatter {
    fn kind(&self) -> ShellKind {
        self.kind
    }

    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "'\\''"))
    }

    fn render_set_env(&self, name: &str, value: &str) -> String {
        format!("export {name}={}", self.quote(value))
    }

    fn render_unset_env(&self, name: &str) -> String {
        format!("unset {name}")
    }

    fn render_add_path(&self, paths: &[String]) -> String {
        let joined = paths.join(self.path_separator());
        format!("export PATH={}:\"$PATH\"", self.quote(&joined))
    }

    fn render_set_path(&self, paths: &[String]) -> String {
        let joined = paths.join(self.path_separator());
        format!("export PATH={}", self.quote(&joined))
    }

    fn path_separator(&self) -> &'static str {
        ":"
    }

    fn hook_script(&self, params: &HookParams) -> String {
        let aliases = params
            .aliases
            .iter()
            .map(|(name, value)| format!("alias {name}={}", self.quote(value)))
            .collect::<Vec<_>>()
            .join("\n");
        let (template, direnv) = match self.kind {
            ShellKind::Zsh => (ZSH_HOOK, ZSH_DIRENV),
            _ => (BASH_HOOK, BASH_DIRENV),
        };
        let vars = [
            ("EVAL", EVAL_FUNCTIONS.to_string()),
            ("SHELL", self.kind.as_str().to_string()),
            ("PROGRAM", params.program.clone()),
            ("SESSION_ID", self.quote(&params.session_id)),
            ("MARK", self.quote(SCRIPT_MARK)),
            ("EVAL_COMMANDS", EVAL_COMMANDS.join("|")),
            ("WORDS", COMPLETION_WORDS.join(" ")),
            ("GLOBALS", render_globals(self, params)),
            ("ALIASES", aliases),
            ("DIRENV", direnv.to_string()),
            ("HOOKS_DIR", self.quote(&params.hooks_dir)),
        ];
        fill(template, &vars)
    }
}

const EVAL_FUNCTIONS: &str = r#"_xenv_eval_result() {
    local result="$1"
    local marker={{MARK}}
    if [[ "$result" == *"$marker"* ]]; then
        local message="${result%%"$marker"*}"
        local expression="${result#*"$marker"}"
        message="${message%$'\n'}"
        [ -n "$message" ] && printf '%s\n' "$message"
        [ -n "$expression" ] && eval "$expression"
    elif [ -n "$result" ]; then
        printf '%s\n' "$result"
    fi
    return 0
}

_xenv_run() {
    local result status
    result="$(command {{PROGRAM}} "$@")"
    status=$?
    _xenv_eval_result "$result"
    return $status
}

xenv() {
    case "$1" in
        {{EVAL_COMMANDS}})
            _xenv_run "$@"
            ;;
        set|unset)
            _xenv_run env "$@"
            ;;
        *)
            command {{PROGRAM}} "$@"
            ;;
    esac
}"#;

const BASH_HOOK: &str = r#"# xenv hook for {{SHELL}}
# add to ~/.bashrc: eval "$(xenv shell --type bash)"

export XENV_HOOK_SHELL={{SHELL}}
export XENV_SESSION_ID={{SESSION_ID}}

{{EVAL}}

{{GLOBALS}}
{{ALIASES}}

complete -W "{{WORDS}}" xenv

{{DIRENV}}

_xenv_hooks_dir={{HOOKS_DIR}}
if [ -d "$_xenv_hooks_dir" ]; then
    for _xenv_hook in "$_xenv_hooks_dir"/*.sh; do
        [ -r "$_xenv_hook" ] && . "$_xenv_hook"
    done
    unset _xenv_hook
fi
unset _xenv_hooks_dir
"#;

const BASH_DIRENV: &str = r#"_xenv_direnv_hook() {
    local status=$?
    if [ "$PWD" != "${_XENV_LAST_PWD:-}" ]; then
        _XENV_LAST_PWD="$PWD"
        _xenv_run direnv
    fi
    return $status
}
case ";${PROMPT_COMMAND:-};" in
    *";_xenv_direnv_hook;"*) ;;
    *) PROMPT_COMMAND="_xenv_direnv_hook${PROMPT_COMMAND:+;$PROMPT_COMMAND}" ;;
esac"#;

const ZSH_HOOK: &str = r#"# xenv hook for {{SHELL}}
# add to ~/.zshrc: eval "$(xenv shell --type zsh)"

export XENV_HOOK_SHELL={{SHELL}}
export XENV_SESSION_ID={{SESSION_ID}}

{{EVAL}}

{{GLOBALS}}
{{ALIASES}}

compctl -k "({{WORDS}})" xenv 2>/dev/null

{{DIRENV}}

_xenv_hooks_dir={{HOOKS_DIR}}
if [ -d "$_xenv_hooks_dir" ]; then
    for _xenv_hook in "$_xenv_hooks_dir"/*.zsh(N); do
        [ -r "$_xenv_hook" ] && source "$_xenv_hook"
    done
    unset _xenv_hook
fi
unset _xenv_hooks_dir
"#;

const ZSH_DIRENV: &str = r#"_xenv_direnv_hook() {
    _xenv_run direnv
}
autoload -Uz add-zsh-hook
add-zsh-hook chpwd _xenv_direnv_hook
_xenv_direnv_hook"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> HookParams {
        HookParams {
            program: "xenv".into(),
            session_id: "s1".into(),
            bin_dir: "/home/dev/.xenv/shims".into(),
            hooks_dir: "/home/dev/.config/xenv/hooks".into(),
            ..Default::default()
        }
    }

    #[test]
    fn quote_escapes_single_quotes() {
        let f = PosixFormatter::new(ShellKind::Bash);
        assert_eq!(f.quote("it's"), "'it'\\''s'");
        assert_eq!(f.render_set_env("MSG", "it's"), "export MSG='it'\\''s'");
    }

    #[test]
    fn dollar_signs_are_not_expanded() {
        let f = PosixFormatter::new(ShellKind::Zsh);
        assert_eq!(f.render_set_env("PRICE", "$5"), "export PRICE='$5'");
    }

    #[test]
    fn bash_hook_uses_prompt_command() {
        let script = PosixFormatter::new(ShellKind::Bash).hook_script(&params());
        assert!(script.contains("export XENV_HOOK_SHELL=bash"));
        assert!(script.contains("PROMPT_COMMAND"));
        assert!(script.contains("complete -W"));
        assert!(script.contains("use|unuse|env|path|direnv)"));
        assert!(script.contains("export PATH='/home/dev/.xenv/shims':\"$PATH\""));
    }

    #[test]
    fn zsh_hook_uses_chpwd() {
        let script = PosixFormatter::new(ShellKind::Zsh).hook_script(&params());
        assert!(script.contains("export XENV_HOOK_SHELL=zsh"));
        assert!(script.contains("add-zsh-hook chpwd _xenv_direnv_hook"));
        assert!(script.contains("compctl"));
        assert!(!script.contains("PROMPT_COMMAND"));
    }

    #[test]
    fn aliases_rendered() {
        let mut p = params();
        p.aliases.insert("ll".into(), "ls -la".into());
        let script = PosixFormatter::new(ShellKind::Bash).hook_script(&p);
        assert!(script.contains("alias ll='ls -la'"));
    }
}
