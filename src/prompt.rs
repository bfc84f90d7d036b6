//! Prompt factories.
//!
//! Each factory turns the user's request plus the piped input (or a sample of it) into
//! the initial request for one backend exchange. The reply grammar is spelled out with
//! the configured [`TagGrammar`] so the parser and the prompt always agree.

use crate::protocol::{BlockName, TagGrammar};
use crate::provider::Message;

/// Request used when input is piped in but no instruction is given.
pub const DEFAULT_FILTER_REQUEST: &str = "Process the input data following standard Unix \
filter principles. If it looks like structured data (such as CSV, JSON or YAML), keep or \
transform the structure as appropriate. If it is plain text, summarize it concisely.";

/// Builds the initial request for one exchange.
pub trait PromptFactory: Send + Sync {
    /// `input` is the chunk text (filtering), an input sample (program generation) or
    /// empty; `chunk_index` is 1-based.
    fn messages(
        &self,
        request: &str,
        input: &str,
        total_chunks: usize,
        chunk_index: usize,
    ) -> Vec<Message>;

    fn name(&self) -> &'static str;
}

/// Which factory a run uses, from execution mode and input presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    Request,
    Filtering,
    Program,
    FilteringProgram,
}

impl PromptMode {
    pub fn select(execute: bool, has_input: bool) -> Self {
        match (execute, has_input) {
            (false, false) => PromptMode::Request,
            (false, true) => PromptMode::Filtering,
            (true, false) => PromptMode::Program,
            (true, true) => PromptMode::FilteringProgram,
        }
    }

    /// `interpreter` is the command generated programs run under.
    pub fn factory(self, grammar: &TagGrammar, interpreter: &str) -> Box<dyn PromptFactory> {
        let grammar = grammar.clone();
        match self {
            PromptMode::Request => Box::new(RequestPrompt::new(grammar)),
            PromptMode::Filtering => Box::new(FilteringPrompt::new(grammar)),
            PromptMode::Program => Box::new(ProgramPrompt::new(grammar, interpreter)),
            PromptMode::FilteringProgram => {
                Box::new(FilteringProgramPrompt::new(grammar, interpreter))
            }
        }
    }

    pub fn is_execution(self) -> bool {
        matches!(self, PromptMode::Program | PromptMode::FilteringProgram)
    }
}

fn identity() -> String {
    format!(
        "# You are tulp {}, a Unix command-line tool.",
        env!("CARGO_PKG_VERSION")
    )
}

fn block(grammar: &TagGrammar, name: BlockName, hint: &str) -> String {
    format!(
        "{}\n{}\n{}",
        grammar.block_start(name),
        hint,
        grammar.block_end
    )
}

/// Grammar rules shared by every factory.
fn format_rules(grammar: &TagGrammar) -> String {
    format!(
        "# Response format\n\
         - The reply MUST begin with {start} on its own line and finish with {end} on its own line.\n\
         - Content is organized in blocks. A block opens with a line such as {stdout_tag} and \
         closes with {block_end}. Every marker stays on a line of its own.\n\
         - The {stdout} block holds the product and nothing else: no greetings, no markdown \
         fences, no commentary unless the instructions ask for it.\n\
         - Explanations go only in the {stderr} block.\n\
         - Use the {error} block only when the request cannot be fulfilled; never emit a \
         {stdout} block together with an {error} block.\n\
         - Never ask follow-up questions.",
        start = grammar.reply_start,
        end = grammar.reply_end,
        stdout_tag = grammar.block_start(BlockName::Stdout),
        block_end = grammar.block_end,
        stdout = BlockName::Stdout,
        stderr = BlockName::Stderr,
        error = BlockName::Error,
    )
}

fn template(grammar: &TagGrammar, stdout_hint: &str, stderr_hint: &str) -> String {
    format!(
        "## Reply template\n{}\n{}\n{}\n{}\n{}",
        grammar.reply_start,
        block(grammar, BlockName::Stdout, stdout_hint),
        block(
            grammar,
            BlockName::Error,
            "<only when the request cannot be fulfilled: the reason, stated briefly>"
        ),
        block(grammar, BlockName::Stderr, stderr_hint),
        grammar.reply_end
    )
}

fn wrap_input(grammar: &TagGrammar, input: &str) -> String {
    format!("{}\n{}\n{}", grammar.input_start, input, grammar.input_end)
}

/// Direct request, no piped input.
pub struct RequestPrompt {
    grammar: TagGrammar,
}

impl RequestPrompt {
    pub fn new(grammar: TagGrammar) -> Self {
        Self { grammar }
    }
}

impl PromptFactory for RequestPrompt {
    fn messages(&self, request: &str, _input: &str, _total: usize, _index: usize) -> Vec<Message> {
        let g = &self.grammar;
        let system = format!(
            "{}\n\
             - Answer the user's request. Your answer is written to standard output, so it \
             must be directly usable by a script or another program.\n\n\
             {}\n\n\
             {}",
            identity(),
            format_rules(g),
            template(
                g,
                "<the answer to the request>",
                "<what was done and any assumptions made>"
            )
        );
        vec![
            Message::system(system),
            Message::user(format!("# Request\n{}", request)),
        ]
    }

    fn name(&self) -> &'static str {
        "request"
    }
}

/// Piped input is processed according to the request, one chunk per exchange.
pub struct FilteringPrompt {
    grammar: TagGrammar,
}

impl FilteringPrompt {
    pub fn new(grammar: TagGrammar) -> Self {
        Self { grammar }
    }
}

impl PromptFactory for FilteringPrompt {
    fn messages(
        &self,
        request: &str,
        input: &str,
        total_chunks: usize,
        chunk_index: usize,
    ) -> Vec<Message> {
        let g = &self.grammar;
        let chunk_rules = if total_chunks > 1 {
            format!(
                "\n- The input below is chunk {} of {}. Earlier chunks were processed with the \
                 same instructions and every chunk's output is concatenated in order, so \
                 continue any structure started earlier instead of reopening it.",
                chunk_index, total_chunks
            )
        } else {
            String::new()
        };
        let system = format!(
            "{}\n\
             - You behave like a Unix filter: read the input delimited by {} and {}, apply \
             the processing instructions to all of it, and write the result to the {} block.\n\
             - Keep the input's format unless the instructions ask for another one.\n\
             - When no transformation is requested, reproduce the input unchanged.\n\
             - Do not summarize unless asked to.{}\n\n\
             {}\n\n\
             {}",
            identity(),
            g.input_start,
            g.input_end,
            BlockName::Stdout,
            chunk_rules,
            format_rules(g),
            template(
                g,
                "<the processed input>",
                "<what was done to produce the output and how>"
            )
        );
        let user = format!(
            "# Processing instructions\n{}\n\n# Input chunk {}/{}\n{}",
            request,
            chunk_index,
            total_chunks,
            wrap_input(g, input)
        );
        vec![Message::system(system), Message::user(user)]
    }

    fn name(&self) -> &'static str {
        "filtering"
    }
}

/// Language generated programs are written in, named after the interpreter command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLanguage {
    name: String,
    interpreter: String,
}

impl ProgramLanguage {
    pub fn from_interpreter(interpreter: &str) -> Self {
        let command = interpreter
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(interpreter)
            .trim_end_matches(".exe");
        let family = command.trim_end_matches(|c: char| c.is_ascii_digit() || c == '.');
        let name = match family {
            "python" | "pypy" => "Python",
            "node" | "nodejs" | "deno" | "bun" => "JavaScript",
            "ruby" => "Ruby",
            "perl" => "Perl",
            "php" => "PHP",
            "sh" | "bash" | "dash" | "zsh" | "ksh" => "shell",
            _ => command,
        };
        Self {
            name: name.to_string(),
            interpreter: interpreter.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_python(&self) -> bool {
        self.name == "Python"
    }
}

fn program_rules(language: &ProgramLanguage) -> String {
    let mut rules = format!(
        "# Program requirements\n\
         - Write one complete, runnable {} program. It is executed as-is with `{} -c`.\n\
         - Write the final result to standard output; diagnostics go to standard error.",
        language.name, language.interpreter
    );
    if language.is_python() {
        rules.push_str(
            "\n- Put every import at the top and prefer the standard library.\n\
             - Keep the logic in a main() function called from an \
             `if __name__ == \"__main__\":` guard.",
        );
    }
    rules
}

/// Execution mode without piped input: a program that answers the request.
pub struct ProgramPrompt {
    grammar: TagGrammar,
    language: ProgramLanguage,
}

impl ProgramPrompt {
    pub fn new(grammar: TagGrammar, interpreter: &str) -> Self {
        Self {
            grammar,
            language: ProgramLanguage::from_interpreter(interpreter),
        }
    }
}

impl PromptFactory for ProgramPrompt {
    fn messages(&self, request: &str, _input: &str, _total: usize, _index: usize) -> Vec<Message> {
        let g = &self.grammar;
        let language = self.language.name();
        let system = format!(
            "{}\n\
             - Instead of answering directly, write a {} program whose standard output \
             is the answer to the user's request. The whole program goes in the {} block.\n\n\
             {}\n\n\
             {}\n\n\
             {}",
            identity(),
            language,
            BlockName::Stdout,
            program_rules(&self.language),
            format_rules(g),
            template(
                g,
                &format!("<the complete {} program>", language),
                "<what the program does; list any third-party packages it needs>"
            )
        );
        vec![
            Message::system(system),
            Message::user(format!(
                "# Request\nWrite a {} program that does the following and prints the \
                 result:\n{}",
                language, request
            )),
        ]
    }

    fn name(&self) -> &'static str {
        "program"
    }
}

/// Execution mode with piped input: a filter program, shown a sample of its input.
pub struct FilteringProgramPrompt {
    grammar: TagGrammar,
    language: ProgramLanguage,
}

impl FilteringProgramPrompt {
    pub fn new(grammar: TagGrammar, interpreter: &str) -> Self {
        Self {
            grammar,
            language: ProgramLanguage::from_interpreter(interpreter),
        }
    }
}

impl PromptFactory for FilteringProgramPrompt {
    fn messages(&self, request: &str, input: &str, _total: usize, _index: usize) -> Vec<Message> {
        let g = &self.grammar;
        let language = self.language.name();
        let system = format!(
            "{}\n\
             - Write a {} program that reads all of its data from standard input, \
             processes it as the request describes, and writes the result to standard \
             output, like a Unix filter. The whole program goes in the {} block.\n\
             - The program will run on the full input, which may be much larger than the \
             sample shown; process it line by line when that is natural.\n\n\
             {}\n\n\
             {}\n\n\
             {}",
            identity(),
            language,
            BlockName::Stdout,
            program_rules(&self.language),
            format_rules(g),
            template(
                g,
                &format!("<the complete {} program>", language),
                "<what the program does; list any third-party packages it needs>"
            )
        );
        let user = format!(
            "# Request\nWrite a {} program that reads standard input and does the \
             following:\n{}\n\n# Input sample (format illustration only)\n{}",
            language,
            request,
            wrap_input(g, input)
        );
        vec![Message::system(system), Message::user(user)]
    }

    fn name(&self) -> &'static str {
        "filtering_program"
    }
}

/// Follow-up asking the backend to resume a cut-short reply.
pub fn continuation_message(grammar: &TagGrammar, chunk_label: &str) -> Message {
    Message::user(format!(
        "Continue exactly where you left off for chunk {}. Do not repeat anything already \
         written and keep using the same block markers ({} ... {}). Finish the whole reply \
         with {} on its own line once it is complete.",
        chunk_label,
        grammar.block_start(BlockName::Stdout),
        grammar.block_end,
        grammar.reply_end
    ))
}

/// Follow-up when a reply carried no program.
pub fn missing_program_message(grammar: &TagGrammar) -> Message {
    Message::user(format!(
        "Your previous reply did not contain a program. Write the complete program \
         inside the {} ... {} block, and make sure it is not empty.",
        grammar.block_start(BlockName::Stdout),
        grammar.block_end
    ))
}

/// Follow-up carrying the failed program's error output.
pub fn repair_message(grammar: &TagGrammar, error_output: &str) -> Message {
    let error_output = if error_output.trim().is_empty() {
        "<no error output captured>"
    } else {
        error_output.trim()
    };
    Message::user(format!(
        "The program from the {} block failed when executed. Error output:\n```\n{}\n```\n\
         Review the original request, your program and this error, then reply with a \
         corrected, complete program inside the {} ... {} block.",
        BlockName::Stdout,
        error_output,
        grammar.block_start(BlockName::Stdout),
        grammar.block_end
    ))
}
