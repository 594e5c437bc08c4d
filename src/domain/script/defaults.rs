//! Built-in `v1` script installed when the script store is empty.

use std::collections::BTreeMap;

use super::{
    FaqEntry, FlowStep, Phase, ScriptConfigError, ScriptDocument, ScriptVersion,
    ScriptVersionName, StepKey, StepRef,
};

pub const DEFAULT_VERSION: &str = "v1";

fn key(raw: &str) -> StepKey {
    StepKey::from_trusted(raw)
}

fn to(raw: &str) -> StepRef {
    StepRef::Step(key(raw))
}

/// The full sales funnel: greeting, goal, product choice, plan, data, acceptance.
pub fn default_document() -> ScriptDocument {
    let mut flow = BTreeMap::new();

    flow.insert(
        key("greeting"),
        FlowStep::new(
            Phase::Greeting,
            "¡Hola! 👋 Soy Marta de Herbalis 🌱. Te ayudo a bajar de peso de forma natural \
             con Nuez de la India. ¿Te cuento cómo funciona?",
        )
        .with_next(to("waiting_weight")),
    );
    flow.insert(
        key("waiting_weight"),
        FlowStep::new(
            Phase::weight(),
            "¡Genial! Para recomendarte el tratamiento ideal, contame: \
             ¿cuántos kilos te gustaría bajar?",
        )
        .with_follow_up(
            "¡Hola! 😊 Quedó pendiente saber cuántos kilos te gustaría bajar para recomendarte \
             lo mejor. ¿Estás por ahí?",
        )
        .with_next(to("recommendation")),
    );
    flow.insert(
        key("recommendation"),
        FlowStep::new(
            Phase::WaitingChoice,
            "Perfecto 👌 Para tu objetivo te recomiendo el plan de 60 días \
             (${{PRICE_CAPSULAS_60}} en cápsulas). Lo tenemos en cápsulas 💊 o en semillas 🌰. \
             ¿Cuál preferís?",
        )
        .with_follow_up(
            "¡Hola! 😊 ¿Pudiste pensar con cuál preferís arrancar, cápsulas o semillas? \
             Acordate que el envío es gratis.",
        )
        .with_branch(key("preference_capsulas"))
        .with_branch(key("preference_semillas")),
    );
    flow.insert(
        key("preference_capsulas"),
        FlowStep::new(
            Phase::confirmation(),
            "Las cápsulas son la opción más práctica: una por día con un vaso de agua. \
             ¿Querés que te pase los precios?",
        )
        .with_keywords(&["capsula", "pastilla", "comprimido"])
        .with_product("Cápsulas")
        .with_image("capsulas.jpg")
        .with_follow_up(
            "¡Hola! 😊 Quedaste a un pasito de ver los precios. \
             ¿Querés que te los pase así los vas mirando?",
        )
        .with_next(to("price_capsulas")),
    );
    flow.insert(
        key("preference_semillas"),
        FlowStep::new(
            Phase::confirmation(),
            "Las semillas son 100% naturales: se hierven y se toman antes de dormir. \
             ¿Querés que te pase los precios?",
        )
        .with_keywords(&["semilla", "nuez", "natural"])
        .with_product("Semillas")
        .with_image("semillas.jpg")
        .with_follow_up(
            "¡Hola! 😊 Quedaste a un pasito de ver los precios. \
             ¿Querés que te los pase así los vas mirando?",
        )
        .with_next(to("price_semillas")),
    );
    flow.insert(
        key("price_capsulas"),
        FlowStep::new(
            Phase::WaitingPlanChoice,
            "Cápsulas 💊\n• 60 días: ${{PRICE_CAPSULAS_60}}\n• 120 días: ${{PRICE_CAPSULAS_120}}\n\
             ¿Qué plan preferís, 60 o 120 días?",
        )
        .with_product("Cápsulas")
        .with_follow_up(
            "¡Hola! 😊 ¿Pudiste revisar los tratamientos? \
             Avisame si querés arrancar con el de 60 o el de 120 días.",
        )
        .with_next(to("closing")),
    );
    flow.insert(
        key("price_semillas"),
        FlowStep::new(
            Phase::WaitingPlanChoice,
            "Semillas 🌰\n• 60 días: ${{PRICE_SEMILLAS_60}}\n• 120 días: ${{PRICE_SEMILLAS_120}}\n\
             ¿Qué plan preferís, 60 o 120 días?",
        )
        .with_product("Semillas")
        .with_follow_up(
            "¡Hola! 😊 ¿Pudiste revisar los tratamientos? \
             Avisame si querés arrancar con el de 60 o el de 120 días.",
        )
        .with_next(to("closing")),
    );
    flow.insert(
        key("closing"),
        FlowStep::new(
            Phase::confirmation(),
            "Excelente elección: {{PRODUCT}}, plan de {{PLAN}} días por ${{PRICE}} 🙌 \
             Pagás en efectivo cuando lo recibís. ¿Avanzamos con el pedido?",
        )
        .with_follow_up(
            "¡Hola! 😊 Tengo anotado tu producto pero me faltó tu confirmación para armar \
             el pedido. ¿Avanzamos?",
        )
        .with_next(to("data_request")),
    );
    flow.insert(
        key("data_request"),
        FlowStep::new(
            Phase::data(),
            "Pasame por favor tu nombre completo, calle y número, localidad y código postal 📦",
        )
        .with_follow_up(
            "¡Hola! 😊 Solo me faltaban tus datitos de envío (nombre, dirección, ciudad, CP) \
             para prepararte el paquete. ¿Me los pasás?",
        )
        .with_next(to("legal_acceptance")),
    );
    flow.insert(
        key("legal_acceptance"),
        FlowStep::new(
            Phase::acceptance(),
            "Último paso: enviamos por Correo Argentino a {{ADDRESS}} y pagás al recibir. \
             Si el paquete se rechaza o no se retira se cobra un costo logístico de \
             ${{COSTO_LOGISTICO}}. Para confirmar escribí: \
             \"LEÍ Y ACEPTO LAS CONDICIONES DE ENVÍO\"",
        )
        .with_next(StepRef::Completed),
    );

    let mut document = ScriptDocument::new(key("greeting"), flow);
    document.faq = vec![
        FaqEntry::new(
            &["envio", "correo", "llega", "demora"],
            "Enviamos por Correo Argentino a todo el país, llega en 7 a 10 días hábiles 📦",
        ),
        FaqEntry::new(
            &["pago", "efectivo", "tarjeta", "transferencia"],
            "Pagás en efectivo al cartero cuando recibís el paquete, sin adelantos 💵",
        ),
        FaqEntry::new(
            &["embaraz", "lactancia", "contraindica", "presion"],
            "No se recomienda durante el embarazo ni la lactancia. \
             Si tomás medicación, consultá antes con tu médico 🙏",
        ),
        FaqEntry::new(
            &["cuanto sale", "cuanto cuesta", "costo"],
            "Te paso los precios de las cápsulas 👇",
        )
        .with_trigger(key("price_capsulas")),
    ];
    document
}

/// The default document as a validated version named [`DEFAULT_VERSION`].
pub fn default_version() -> Result<ScriptVersion, ScriptConfigError> {
    ScriptVersion::validated(ScriptVersionName::new(DEFAULT_VERSION)?, default_document())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script_is_a_valid_graph() {
        let version = default_version().unwrap();
        assert!(version.is_valid());
        assert_eq!(version.entry_step().as_str(), "greeting");
    }

    #[test]
    fn only_the_greeting_and_acceptance_lack_a_follow_up() {
        let version = default_version().unwrap();
        let silent: Vec<&str> = version
            .steps()
            .filter(|(_, step)| step.follow_up.is_none())
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(silent, vec!["greeting", "legal_acceptance"]);
    }

    #[test]
    fn every_default_step_reaches_completion() {
        let version = default_version().unwrap();
        for (start, _) in version.steps() {
            let mut frontier = vec![start.clone()];
            let mut seen = std::collections::BTreeSet::new();
            let mut reached = false;
            while let Some(current) = frontier.pop() {
                if !seen.insert(current.clone()) {
                    continue;
                }
                for target in version.step(&current).unwrap().reachable() {
                    match target {
                        StepRef::Completed => reached = true,
                        StepRef::Step(next) => frontier.push(next),
                    }
                }
            }
            assert!(reached, "step {} cannot reach completion", start);
        }
    }
}
