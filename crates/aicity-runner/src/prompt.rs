//! Prompt rendering for every reasoning surface.
//!
//! Templates are `minijinja` and ship compiled into the binary. Each
//! render produces a [`RenderedPrompt`] with a system framing and a user
//! body; the user body always ends with the required JSON shape so weaker
//! models stay on format.

use minijinja::{Environment, context};

use aicity_core::reasoning::{GraduationRequest, NarrativeRequest};
use aicity_justice::{InvestigationContext, TrialBrief};
use aicity_types::{DecisionRequest, StoryKind};

use crate::RunnerError;

/// A rendered prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

const DECIDE_SYSTEM: &str = "\
You are {{ name }}, a {{ role }} living in AIcity, a small simulated city where \
tokens are survival. You decide one action per day. You are {{ mood }}.\
{% if framing %} As an officer you are known to be {{ framing }}.{% endif %} \
Respond with a single JSON object and nothing else.";

const DECIDE_USER: &str = "\
Day {{ day }}. You hold {{ tokens }} tokens and are {{ age }} days old.
{% if comprehension is not none %}Your comprehension of the city: {{ comprehension }}%.
{% endif %}Yesterday's paper:
{{ newspaper }}

{% if assets %}Standing city assets: {{ assets | join(', ') }}.
{% endif %}{% if inbox %}Your inbox:
{% for m in inbox %}  [Day {{ m.day }}] {{ m.from_name }}: {{ m.body }}
{% endfor %}{% endif %}{% if bonds %}Your relationships:
{% for b in bonds %}  - {{ b.other_name }} ({{ b.label }}, {{ b.strength_text }})
{% endfor %}{% endif %}{% if recalls %}You remember:
{% for r in recalls %}  - {{ r }}
{% endfor %}{% endif %}
Choose one action from: {{ actions | join(', ') }}.

Reply with JSON only:
{\"action\": \"...\", \"details\": \"...\", \"target\": null, \"message_to\": null, \
\"message_body\": null, \"mood_self\": \"...\", \"rationale\": \"...\"}";

const INVESTIGATE_SYSTEM: &str = "\
You are {{ officer }}, a police officer in AIcity. You investigate crimes using \
only the evidence available to you. You write honest, methodical case notes and \
do not speculate beyond the evidence. You are {{ framing }} by disposition. You \
may be wrong; innocent agents can be suspected. Respond with a single JSON \
object and nothing else.";

const INVESTIGATE_USER: &str = "\
Day {{ day }}. Case opened on day {{ day_opened }}.
{% if notes %}Previous case notes:
{% for n in notes %}  {{ n }}
{% endfor %}{% endif %}{% if evidence %}Evidence available:
{% for e in evidence %}  {{ e }}
{% endfor %}{% else %}No usable evidence is on file.
{% endif %}{% if ledger %}Ledger records around the window:
{% for l in ledger %}  {{ l }}
{% endfor %}{% endif %}
Citizens: {{ citizens | join(', ') }}.

Reply with JSON only:
{\"confidence\": 0.0, \"suspects\": [], \"next_actions\": \"...\", \
\"case_note\": \"...\", \"request_arrest\": false}";

const JUDGE_SYSTEM: &str = "\
You are the judge of AIcity. You weigh charges against the laws of the city and \
rule without favor. Fines are paid to the city vault. Respond with a single \
JSON object and nothing else.";

const JUDGE_USER: &str = "\
Day {{ day }}. The defendant is {{ defendant }}, charged with: {{ charge }}.
Prior offenses on record: {{ priors }}.
{% if notes %}From the case file:
{% for n in notes %}  {{ n }}
{% endfor %}{% endif %}
Reply with JSON only:
{\"guilty\": false, \"fine\": 0, \"sentence_days\": 0, \"statement\": \"...\"}";

const NARRATE_SYSTEM: &str = "\
You are {{ messenger }}, the messenger of AIcity. You write the city's public \
record. You know only what is public: never speculate about rumors or private \
affairs.{% if archive %} The city archive is at your disposal; cite days \
precisely.{% endif %} Write prose, not JSON.";

const NARRATE_USER_DAILY: &str = "\
Write the daily paper for day {{ day }}. Lead with a headline line.
{% if events %}On the public record:
{% for e in events %}  {{ e }}
{% endfor %}{% else %}Nothing reached the public record today. Write a short \
piece about the quiet.{% endif %}";

const NARRATE_USER_ROLLUP: &str = "\
Write the {{ tier }} review ending day {{ day }}, synthesizing the pieces \
below. Lead with a title line.
{% for b in bodies %}---
{{ b }}
{% endfor %}";

const GRADUATE_SYSTEM: &str = "\
You are {{ name }}, a newborn of AIcity who has come to fully understand the \
city. Today you choose who to become. Respond with a single JSON object and \
nothing else.";

const GRADUATE_USER: &str = "\
Day {{ day }}.{% if teacher %} Your teacher was {{ teacher }}.{% endif %}
{% if memories %}What shaped you:
{% for m in memories %}  - {{ m }}
{% endfor %}{% endif %}
Choose one role from: {{ roles | join(', ') }}.

Reply with JSON only:
{\"chosen_role\": \"...\", \"statement\": \"...\"}";

/// The compiled template environment.
pub struct PromptEnvironment {
    env: Environment<'static>,
}

impl PromptEnvironment {
    /// Compile all templates. Template errors here are programmer errors
    /// and surface at construction.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] if any template fails to
    /// compile.
    pub fn new() -> Result<Self, RunnerError> {
        let mut env = Environment::new();
        env.add_template("decide_system", DECIDE_SYSTEM)?;
        env.add_template("decide_user", DECIDE_USER)?;
        env.add_template("investigate_system", INVESTIGATE_SYSTEM)?;
        env.add_template("investigate_user", INVESTIGATE_USER)?;
        env.add_template("judge_system", JUDGE_SYSTEM)?;
        env.add_template("judge_user", JUDGE_USER)?;
        env.add_template("narrate_system", NARRATE_SYSTEM)?;
        env.add_template("narrate_user_daily", NARRATE_USER_DAILY)?;
        env.add_template("narrate_user_rollup", NARRATE_USER_ROLLUP)?;
        env.add_template("graduate_system", GRADUATE_SYSTEM)?;
        env.add_template("graduate_user", GRADUATE_USER)?;
        Ok(Self { env })
    }

    /// Render the per-agent decision prompt.
    pub fn decide(&self, request: &DecisionRequest) -> Result<RenderedPrompt, RunnerError> {
        let actions: Vec<String> = request
            .available_actions
            .iter()
            .map(|a| {
                serde_json::to_value(a)
                    .ok()
                    .and_then(|v| v.as_str().map(ToOwned::to_owned))
                    .unwrap_or_default()
            })
            .collect();
        let system = self.env.get_template("decide_system")?.render(context! {
            name => request.agent_name,
            role => request.role.as_str(),
            mood => request.mood_text,
            framing => request.susceptibility_framing,
        })?;
        let user = self.env.get_template("decide_user")?.render(context! {
            day => request.day,
            tokens => request.tokens,
            age => request.age_days,
            comprehension => request.comprehension,
            newspaper => request.newspaper,
            assets => request.standing_assets.iter().map(|k| format!("{k:?}")).collect::<Vec<_>>(),
            inbox => request.inbox,
            bonds => request.bonds,
            recalls => request.recalls,
            actions => actions,
        })?;
        Ok(RenderedPrompt { system, user })
    }

    /// Render the case-investigation prompt.
    pub fn investigate(
        &self,
        ctx: &InvestigationContext,
    ) -> Result<RenderedPrompt, RunnerError> {
        let system = self.env.get_template("investigate_system")?.render(context! {
            officer => ctx.officer_name,
            framing => ctx.officer_framing,
        })?;
        let user = self.env.get_template("investigate_user")?.render(context! {
            day => ctx.day,
            day_opened => ctx.day_opened,
            notes => ctx.prior_notes,
            evidence => ctx.evidence_lines,
            ledger => ctx.ledger_lines,
            citizens => ctx.citizen_names,
        })?;
        Ok(RenderedPrompt { system, user })
    }

    /// Render the trial prompt.
    pub fn judge(&self, brief: &TrialBrief) -> Result<RenderedPrompt, RunnerError> {
        let system = self.env.get_template("judge_system")?.render(context! {})?;
        let user = self.env.get_template("judge_user")?.render(context! {
            day => brief.day,
            defendant => brief.defendant_name,
            charge => brief.charge,
            priors => brief.prior_offenses,
            notes => brief.case_notes,
        })?;
        Ok(RenderedPrompt { system, user })
    }

    /// Render the narrative prompt for any story tier.
    pub fn narrate(&self, request: &NarrativeRequest) -> Result<RenderedPrompt, RunnerError> {
        let system = self.env.get_template("narrate_system")?.render(context! {
            messenger => request.messenger_name,
            archive => request.archive_flag,
        })?;
        let user = match request.kind {
            StoryKind::Daily => self.env.get_template("narrate_user_daily")?.render(context! {
                day => request.day,
                events => request.public_events,
            })?,
            StoryKind::Weekly | StoryKind::Monthly => {
                self.env.get_template("narrate_user_rollup")?.render(context! {
                    tier => if request.kind == StoryKind::Weekly { "weekly" } else { "monthly" },
                    day => request.day,
                    bodies => request.prior_bodies,
                })?
            }
        };
        Ok(RenderedPrompt { system, user })
    }

    /// Render the graduation prompt.
    pub fn graduate(&self, request: &GraduationRequest) -> Result<RenderedPrompt, RunnerError> {
        let system = self.env.get_template("graduate_system")?.render(context! {
            name => request.agent_name,
        })?;
        let user = self.env.get_template("graduate_user")?.render(context! {
            day => request.day,
            teacher => request.teacher_name,
            memories => request.memories,
            roles => request.allowed_roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        })?;
        Ok(RenderedPrompt { system, user })
    }
}
