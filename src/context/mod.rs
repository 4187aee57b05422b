//! Context Assembler: builds the message text for each completion call.
//!
//! Every function here is a pure function of its inputs. Given the same paper,
//! planning record, config text and completed files, the same prompt comes
//! out, which is what makes an interrupted run resumable.

pub mod budget;

use std::collections::HashMap;

use crate::paper::{PaperDocument, PaperFormat};
use crate::planning::PlanningRecord;
use crate::prompts;
use crate::util::fence_language;

pub use budget::{ContextLimit, ensure_within_budget, message_chars, parse_context_limit};

/// Identifier of the configuration pseudo-file. It is always "done" and never
/// generated by the coding stage.
pub const CONFIG_SENTINEL: &str = "config.yaml";

/// Files completed so far in a stage, in task-list order, with the source each
/// one produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoneFiles {
    order: Vec<String>,
    outputs: HashMap<String, String>,
}

impl Default for DoneFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl DoneFiles {
    pub fn new() -> Self {
        Self {
            order: vec![CONFIG_SENTINEL.to_string()],
            outputs: HashMap::new(),
        }
    }

    pub fn push(&mut self, file: &str, output: impl Into<String>) {
        if !self.order.iter().any(|f| f == file) {
            self.order.push(file.to_string());
        }
        self.outputs.insert(file.to_string(), output.into());
    }

    pub fn contains(&self, file: &str) -> bool {
        self.order.iter().any(|f| f == file)
    }

    pub fn files(&self) -> &[String] {
        &self.order
    }

    pub fn output(&self, file: &str) -> Option<&str> {
        self.outputs.get(file).map(String::as_str)
    }

    /// Completed source files in order. YAML files are left out; the config is
    /// rendered in its own section.
    pub fn code_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter(|f| !is_yaml(f))
            .filter_map(|f| self.outputs.get(f).map(|code| (f.as_str(), code.as_str())))
    }
}

fn is_yaml(file: &str) -> bool {
    file.ends_with(".yaml") || file.ends_with(".yml")
}

/// Python-style list rendering used in "We have [...]" lines.
fn list_literal(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|f| format!("'{f}'")).collect();
    format!("[{}]", quoted.join(", "))
}

fn with_format(template: &str, format: PaperFormat) -> String {
    template.replace("{paper_format}", &format.to_string())
}

pub fn planning_system(format: PaperFormat) -> String {
    with_format(prompts::PLANNING_SYSTEM, format)
}

/// The four planning user turns, in order.
pub fn planning_turns(paper: &PaperDocument) -> [String; 4] {
    [
        prompts::PLANNING_OVERVIEW.replace("{paper}", &paper.render()),
        prompts::PLANNING_DESIGN.to_string(),
        prompts::PLANNING_TASK.to_string(),
        prompts::PLANNING_CONFIG.to_string(),
    ]
}

pub fn analysis_system(format: PaperFormat) -> String {
    with_format(prompts::ANALYSIS_SYSTEM, format)
}

/// User turn asking for the logic analysis of `file`.
pub fn analysis_instruction(
    paper: &PaperDocument,
    planning: &PlanningRecord,
    config_yaml: &str,
    file: &str,
    rationale: &str,
) -> String {
    let target = if rationale.trim().is_empty() {
        format!("Write the logic analysis in '{file}'.")
    } else {
        format!("Write the logic analysis in '{file}', which is intended for '{rationale}'.")
    };
    format!(
        "# Context\n\
         ## Paper\n{paper}\n\n\
         -----\n\n\
         ## Overview of the plan\n{overview}\n\n\
         -----\n\n\
         ## Design\n{design}\n\n\
         -----\n\n\
         ## Task\n{task}\n\n\
         -----\n\n\
         ## Configuration file\n```yaml\n{config}\n```\n\
         -----\n\n\
         ## Instruction\n\
         Conduct a Logic Analysis to assist in writing the code, based on the paper, the plan, \
         the design, the task and the previously specified configuration file (config.yaml).\n\
         You DON'T need to provide the actual code yet; focus on a thorough, clear analysis.\n\n\
         {target}\n\n\
         -----\n\n\
         ## Logic Analysis: {file}",
        paper = paper.render(),
        overview = planning.overview,
        design = planning.design,
        task = planning.task_list,
        config = config_yaml.trim_end(),
    )
}

/// Completed code, each file fenced and labeled with its identifier.
pub fn code_files_section(done: &DoneFiles) -> String {
    let mut out = String::new();
    for (file, code) in done.code_files() {
        out.push_str(&format!(
            "### {file}\n```{lang}\n{code}\n```\n\n",
            lang = fence_language(file),
            code = code.trim_end(),
        ));
    }
    out
}

fn format_example(file: &str) -> String {
    format!(
        "## Code: {file}\n```{lang}\n## {file}\n...\n```",
        lang = fence_language(file)
    )
}

/// User turn asking for the source of `file`.
pub fn coding_instruction(config_yaml: &str, done: &DoneFiles, analysis: &str, file: &str) -> String {
    format!(
        "# Context\n\
         ## Configuration file\n```yaml\n{config}\n```\n\
         -----\n\n\
         ## Code Files\n{code_files}\
         -----\n\n\
         # Format example\n{example}\n\n\
         -----\n\n\
         # Instruction\n\
         Based on the configuration file and the code files above, follow \"Format example\", \
         write the code.\n\n\
         We have {done_list}.\n\
         Next, you must write only the \"{file}\".\n\
         1. Only One file: do your best to implement THIS ONLY ONE FILE.\n\
         2. COMPLETE CODE: your code will be part of the entire project, so implement complete, \
         reliable, reusable code snippets.\n\
         3. Follow design: YOU MUST FOLLOW the classes and functions already defined in the code \
         files. Do not use public member functions that do not exist.\n\
         4. REFER TO CONFIGURATION: use values from config.yaml; do not invent any.\n\n\
         ## Logic Analysis\n{analysis}\n\n\
         ## Code: {file}",
        config = config_yaml.trim_end(),
        code_files = code_files_section(done),
        example = format_example(file),
        done_list = list_literal(done.files()),
    )
}

/// User turn asking for the run script of the finished repository.
pub fn reproduce_instruction(
    config_yaml: &str,
    done: &DoneFiles,
    required_packages: &[String],
    file: &str,
) -> String {
    let packages = if required_packages.is_empty() {
        "(none listed)".to_string()
    } else {
        required_packages.join("\n")
    };
    format!(
        "# Context\n\
         ## Configuration file\n```yaml\n{config}\n```\n\
         -----\n\n\
         ## Code Files\n{code_files}\
         -----\n\n\
         ## Required packages\n{packages}\n\n\
         -----\n\n\
         # Format example\n{example}\n\n\
         -----\n\n\
         # Instruction\n\
         We have {done_list}.\n\
         Write \"{file}\": a self-contained script that sets up the environment, installs the \
         required packages and runs the repository's entry point.\n\n\
         ## Code: {file}",
        config = config_yaml.trim_end(),
        code_files = code_files_section(done),
        example = format_example(file),
        done_list = list_literal(done.files()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn done_with(files: &[(&str, &str)]) -> DoneFiles {
        let mut done = DoneFiles::new();
        for (file, code) in files {
            done.push(file, *code);
        }
        done
    }

    #[test]
    fn test_done_files_start_with_config() {
        let done = DoneFiles::new();
        assert_eq!(done.files(), ["config.yaml"]);
        assert_eq!(done.code_files().count(), 0);
    }

    #[test]
    fn test_code_files_keep_order_and_skip_yaml() {
        let done = done_with(&[("model.py", "class Net: pass"), ("extra.yml", "a: 1"), ("train.py", "Net()")]);
        let files: Vec<&str> = done.code_files().map(|(f, _)| f).collect();
        assert_eq!(files, vec!["model.py", "train.py"]);
    }

    #[test]
    fn test_coding_context_contains_only_prior_files() {
        let done = done_with(&[("model.py", "class Net: pass")]);
        let text = coding_instruction("lr: 0.1\n", &done, "train the net", "train.py");

        assert!(text.contains("### model.py\n```python\nclass Net: pass\n```"));
        assert!(text.contains("We have ['config.yaml', 'model.py']."));
        assert!(text.contains("```yaml\nlr: 0.1\n```"));
        assert!(text.contains("## Logic Analysis\ntrain the net"));
        assert!(text.ends_with("## Code: train.py"));
        assert!(!text.contains("### train.py"));
        assert!(!text.contains("### config.yaml"));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let done = done_with(&[("a.py", "x = 1"), ("b/c.py", "y = 2")]);
        let first = coding_instruction("k: v", &done, "analysis", "d.py");
        let second = coding_instruction("k: v", &done.clone(), "analysis", "d.py");
        assert_eq!(first, second);
    }

    #[test]
    fn test_analysis_instruction_embeds_plan_and_rationale() {
        let paper = PaperDocument::Markup("\\section{Method}".to_string());
        let planning = PlanningRecord {
            overview: "OVERVIEW".into(),
            design: "DESIGN".into(),
            task_list: "TASKS".into(),
            config: None,
        };
        let text = analysis_instruction(&paper, &planning, "lr: 1", "model.py", "defines Net");
        for part in ["\\section{Method}", "OVERVIEW", "DESIGN", "TASKS", "lr: 1"] {
            assert!(text.contains(part), "missing {part}");
        }
        assert!(text.contains("'model.py', which is intended for 'defines Net'"));
        assert!(text.ends_with("## Logic Analysis: model.py"));
    }

    #[test]
    fn test_analysis_instruction_without_rationale() {
        let paper = PaperDocument::Markup("\\section{Method}".to_string());
        let planning = PlanningRecord {
            overview: "OVERVIEW".into(),
            design: "DESIGN".into(),
            task_list: "TASKS".into(),
            config: None,
        };
        let text = analysis_instruction(&paper, &planning, "lr: 1", "train.py", "  ");
        assert!(text.contains("Write the logic analysis in 'train.py'.\n"));
        assert!(!text.contains("intended for"));
    }

    #[test]
    fn test_system_prompts_name_the_format() {
        assert!(analysis_system(PaperFormat::Latex).contains("in LaTeX format"));
        assert!(planning_system(PaperFormat::Json).contains("in JSON format"));
    }

    #[test]
    fn test_planning_turns_embed_paper_once() {
        let paper = PaperDocument::Markup("PAPER BODY".to_string());
        let turns = planning_turns(&paper);
        assert!(turns[0].contains("PAPER BODY"));
        assert!(turns[1..].iter().all(|t| !t.contains("PAPER BODY")));
    }

    #[test]
    fn test_reproduce_instruction_lists_packages() {
        let done = done_with(&[("main.py", "print(1)")]);
        let text = reproduce_instruction("k: v", &done, &["torch".to_string()], "reproduce.sh");
        assert!(text.contains("## Required packages\ntorch"));
        assert!(text.contains("```bash\n## reproduce.sh"));
        assert!(text.ends_with("## Code: reproduce.sh"));
    }
}
